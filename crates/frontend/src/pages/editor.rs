use bhuvan_shared::catalog::{self, CatalogLayer, LayerKind};
use bhuvan_shared::editor::{LoadReport, MapEditor, Notice};
use dioxus::prelude::*;

use crate::api;
use crate::components::layer_panel::LayerPanel;
use crate::components::map_canvas::{fetch_geojson_layer, MapCanvas};
use crate::components::notices::Notices;
use crate::components::save_dialog::{use_save_dialog, SaveDialog};
use crate::components::tool_panel::ToolPanel;
use crate::Route;

const DEFAULT_PROJECT_NAME: &str = "Untitled map";

/// Warnings for whatever a load could not restore.
fn load_notices(report: &LoadReport) -> Vec<Notice> {
    let mut notices: Vec<Notice> = report
        .skipped_layers
        .iter()
        .map(|(kind, entry)| {
            Notice::warning(format!(
                "{kind} layer '{}' is not in the layer catalog and was not restored.",
                entry.layer_name
            ))
        })
        .collect();
    if report.skipped_features > 0 {
        notices.push(Notice::warning(format!(
            "{} saved annotations could not be restored.",
            report.skipped_features
        )));
    }
    notices
}

async fn load_catalog() -> Vec<CatalogLayer> {
    match api::fetch_layers().await {
        Ok(layers) if !layers.is_empty() => layers,
        Ok(_) => catalog::builtin(),
        Err(e) => {
            tracing::warn!(error = %e, "layer catalog unavailable, using built-in list");
            catalog::builtin()
        }
    }
}

#[component]
fn ShareBox(project_id: String) -> Element {
    let url = api::share_url(&project_id);
    rsx! {
        div { class: "panel share-box",
            h3 { "Share" }
            input { r#type: "text", readonly: true, value: "{url}" }
            button {
                class: "secondary",
                onclick: {
                    let url = url.clone();
                    move |_| {
                        let url = url.clone();
                        wasm_bindgen_futures::spawn_local(async move {
                            if let Some(window) = web_sys::window() {
                                let clipboard = window.navigator().clipboard();
                                let _ = wasm_bindgen_futures::JsFuture::from(
                                    clipboard.write_text(&url)
                                ).await;
                            }
                        });
                    }
                },
                "Copy link"
            }
        }
    }
}

/// The editor, empty for a new map or restored from a saved project.
#[component]
pub fn EditorPage(project_id: Option<String>) -> Element {
    let mut editor = use_signal(MapEditor::new);
    let mut catalog = use_signal(Vec::<CatalogLayer>::new);
    let mut project_name = use_signal(|| None::<String>);
    let mut load_error = use_signal(|| None::<String>);
    let mut saving = use_signal(|| false);
    let dialog = use_save_dialog();
    let navigator = use_navigator();

    let loading_id = project_id.clone();
    let loader = use_resource(move || {
        let id = loading_id.clone();
        async move {
            let layers = load_catalog().await;
            catalog.set(layers.clone());
            let Some(id) = id else {
                return;
            };
            match api::load_map(&id).await {
                Ok(resp) => {
                    let (mut loaded, report) = MapEditor::from_map_state(&resp.map_state, &layers);
                    if !report.is_complete() {
                        tracing::warn!(project_id = %id, ?report, "map state only partly restored");
                    }
                    for notice in load_notices(&report) {
                        loaded.notify(notice);
                    }
                    let fetches: Vec<_> = loaded
                        .layers()
                        .of_kind(LayerKind::ExternalGeoJson)
                        .map(|l| (l.id, l.layer.url.clone()))
                        .collect();
                    editor.set(loaded);
                    project_name.set(Some(resp.name));
                    for (layer_id, url) in fetches {
                        fetch_geojson_layer(editor, layer_id, url);
                    }
                }
                Err(e) => load_error.set(Some(e)),
            }
        }
    });

    let on_save = move |_: ()| {
        if *saving.read() {
            return;
        }
        if api::current_user().is_none() {
            editor.write().notify(Notice::error(api::NOT_SIGNED_IN));
            return;
        }
        let default_name = project_name
            .read()
            .clone()
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        spawn(async move {
            let Some(name) = dialog.ask(&default_name).await else {
                return;
            };
            saving.set(true);
            let state = editor.read().to_map_state();
            let result = api::save_map(&name, state).await;
            saving.set(false);
            match result {
                Ok(resp) => {
                    editor.write().notify(Notice::info(resp.message));
                    project_name.set(Some(name));
                    navigator.push(Route::MapView {
                        id: resp.project_id,
                    });
                }
                Err(e) => {
                    editor
                        .write()
                        .notify(Notice::error(format!("Error saving map: {e}")));
                }
            }
        });
    };

    if let Some(err) = load_error.read().clone() {
        return rsx! {
            div { class: "page error-page",
                h2 { "This map could not be loaded" }
                p { "{err}" }
                Link { class: "button", to: Route::Home {}, "Back to projects" }
            }
        };
    }

    let still_loading = project_id.is_some() && loader.read().is_none();
    let title = project_name.read().clone().unwrap_or_else(|| "New map".to_string());
    let user = api::current_user();

    rsx! {
        div { class: "app",
            div { class: "header",
                h1 { "Bhuvan Map Editor" }
                span { class: "project-title", "{title}" }
                div { class: "header-right",
                    if let Some(user) = user {
                        span { class: "user", "{user}" }
                    }
                    Link { to: Route::Home {}, "Projects" }
                }
            }

            div { class: "sidebar",
                ToolPanel { editor, saving: *saving.read(), on_save }
                LayerPanel { editor, catalog: catalog.read().clone() }
                if let Some(id) = project_id.clone() {
                    ShareBox { project_id: id }
                }
            }

            div { class: "map-panel",
                if still_loading {
                    div { class: "map-loading", "Loading map..." }
                } else {
                    MapCanvas { editor }
                }
            }

            Notices { editor }
            SaveDialog { handle: dialog }
        }
    }
}

#[cfg(test)]
mod tests {
    use bhuvan_shared::editor::NoticeLevel;
    use bhuvan_shared::models::LayerEntry;

    use super::*;

    #[test]
    fn test_complete_load_has_no_notices() {
        assert!(load_notices(&LoadReport::default()).is_empty());
    }

    #[test]
    fn test_skipped_layers_and_features_are_reported() {
        let report = LoadReport {
            skipped_layers: vec![(
                LayerKind::Wms,
                LayerEntry {
                    url: "https://h/wms".into(),
                    layer_name: "private:LAYER".into(),
                },
            )],
            skipped_features: 2,
        };
        let notices = load_notices(&report);
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Warning));
        assert!(notices[0].message.contains("private:LAYER"));
        assert!(notices[1].message.starts_with("2 saved annotations"));
    }
}
