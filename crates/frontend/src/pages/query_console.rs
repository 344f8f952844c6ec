use dioxus::prelude::*;
use serde_json::Value;

use crate::api::{self, QueryTarget};
use crate::Route;

const DEFAULT_QUERY: &str =
    "SELECT product_name, theme_name, ST_AsText(geom) AS wkt_geometry FROM bhuvan_land_cover LIMIT 10;";

fn console_title(target: QueryTarget) -> &'static str {
    match target {
        QueryTarget::Central => "Bhuvan Data Explorer",
        QueryTarget::Personal => "Personal Data Hub",
    }
}

/// What the results area shows for a finished query.
#[derive(Debug, Clone, PartialEq)]
enum ResultView {
    Error(String),
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Anything that is not a list of row objects, pretty-printed.
    Raw(String),
}

fn result_view(result: &Result<Value, String>) -> ResultView {
    let payload = match result {
        Ok(payload) => payload,
        Err(e) => return ResultView::Error(e.clone()),
    };
    let rows = api::result_rows(payload);
    let columns = api::result_columns(rows);
    if columns.is_empty() {
        return ResultView::Raw(serde_json::to_string_pretty(payload).unwrap_or_default());
    }
    let rows = rows
        .iter()
        .map(|row| columns.iter().map(|c| api::cell_text(row.get(c))).collect())
        .collect();
    ResultView::Table { columns, rows }
}

/// SQL console against the personal or the central database.
#[component]
pub fn QueryConsole(target: QueryTarget) -> Element {
    let mut sql = use_signal(|| DEFAULT_QUERY.to_string());
    let mut running = use_signal(|| false);
    let mut outcome = use_signal(|| None::<ResultView>);

    let run = move |_: Event<MouseData>| {
        if *running.read() {
            return;
        }
        let text = sql.read().clone();
        running.set(true);
        outcome.set(None);
        spawn(async move {
            let result = match target {
                QueryTarget::Personal => api::execute_query(&text).await,
                QueryTarget::Central => api::execute_central_query(&text).await,
            };
            if let Err(e) = &result {
                tracing::warn!(?target, error = %e, "query failed");
            }
            outcome.set(Some(result_view(&result)));
            running.set(false);
        });
    };

    let title = console_title(target);
    let busy = *running.read();
    rsx! {
        div { class: "page console-page",
            div { class: "header",
                h1 { "{title}" }
                Link { to: Route::Home {}, "Projects" }
            }
            div { class: "panel",
                label { r#for: "query-input", "SQL query" }
                textarea {
                    id: "query-input",
                    class: "sql-input",
                    rows: "5",
                    value: "{sql}",
                    oninput: move |evt: Event<FormData>| sql.set(evt.value()),
                }
                button { disabled: busy, onclick: run,
                    if busy { "Executing..." } else { "Execute query" }
                }
            }
            div { class: "panel",
                h3 { "Query results" }
                match outcome.read().clone() {
                    None if busy => rsx! { p { class: "hint", "Loading results..." } },
                    None => rsx! { p { class: "hint", "Execute a query to see results." } },
                    Some(ResultView::Error(e)) => rsx! { div { class: "error-banner", "Error: {e}" } },
                    Some(ResultView::Raw(text)) => rsx! { pre { class: "json-output", "{text}" } },
                    Some(ResultView::Table { columns, rows }) => rsx! {
                        div { class: "result-scroll",
                            table { class: "result-table",
                                thead {
                                    tr {
                                        for column in columns {
                                            th { key: "{column}", "{column}" }
                                        }
                                    }
                                }
                                tbody {
                                    for (i, row) in rows.into_iter().enumerate() {
                                        tr { key: "{i}",
                                            for cell in row {
                                                td { "{cell}" }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_rows_become_a_table() {
        let view = result_view(&Ok(json!({"data": [
            {"product_name": "LULC", "theme_name": "Forest"},
            {"product_name": "LULC", "area": 4}
        ]})));
        assert_eq!(
            view,
            ResultView::Table {
                columns: vec!["product_name".into(), "theme_name".into(), "area".into()],
                rows: vec![
                    vec!["LULC".into(), "Forest".into(), "".into()],
                    vec!["LULC".into(), "".into(), "4".into()],
                ],
            }
        );
    }

    #[test]
    fn test_non_row_payload_is_shown_raw() {
        let view = result_view(&Ok(json!({"rowCount": 3, "command": "UPDATE"})));
        let ResultView::Raw(text) = view else {
            panic!("expected raw output");
        };
        assert!(text.contains("\"rowCount\": 3"));
    }

    #[test]
    fn test_error_is_kept() {
        assert_eq!(
            result_view(&Err(api::NOT_SIGNED_IN.to_string())),
            ResultView::Error(api::NOT_SIGNED_IN.to_string())
        );
    }

    #[test]
    fn test_console_titles() {
        assert_eq!(console_title(QueryTarget::Central), "Bhuvan Data Explorer");
        assert_eq!(console_title(QueryTarget::Personal), "Personal Data Hub");
    }
}
