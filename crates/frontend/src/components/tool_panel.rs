use bhuvan_shared::editor::{fetch_route, DrawKind, MapEditor, Notice, Tool};
use dioxus::prelude::*;

use crate::api::GatewayRoutes;

fn tool_class(tool: Tool, kind: DrawKind) -> &'static str {
    if tool == Tool::Drawing(kind) {
        "tool active"
    } else {
        "tool"
    }
}

/// Copy `text` to the clipboard, reporting the result on the notice queue.
fn copy_to_clipboard(mut editor: Signal<MapEditor>, text: String) {
    wasm_bindgen_futures::spawn_local(async move {
        let Some(window) = web_sys::window() else {
            return;
        };
        let clipboard = window.navigator().clipboard();
        let notice = match wasm_bindgen_futures::JsFuture::from(clipboard.write_text(&text)).await {
            Ok(_) => Notice::info("GeoJSON copied to clipboard."),
            Err(_) => Notice::error("Could not write to the clipboard."),
        };
        editor.write().notify(notice);
    });
}

/// Name input for the selected feature. Keyed by feature id so the text the
/// user is typing survives re-renders.
#[component]
fn NameEditor(mut editor: Signal<MapEditor>, initial: String) -> Element {
    let mut text = use_signal(|| initial);
    rsx! {
        input {
            r#type: "text",
            placeholder: "Name...",
            value: "{text}",
            oninput: move |evt: Event<FormData>| {
                text.set(evt.value());
                let _ = editor.write().rename_selected(&evt.value());
            },
        }
    }
}

#[component]
pub fn ToolPanel(mut editor: Signal<MapEditor>, saving: bool, on_save: EventHandler<()>) -> Element {
    let ed = editor.read();
    let tool = ed.tool();
    let selected = ed.selected_feature().map(|f| (f.id.clone(), f.kind, f.name.clone()));
    let route_pending = ed.route_pending();
    let counts = (ed.points().len(), ed.polygons().len(), ed.paths().len());
    drop(ed);

    rsx! {
        div { class: "panel",
            h3 { "Draw" }
            div { class: "tool-row",
                button {
                    class: tool_class(tool, DrawKind::Point),
                    onclick: move |_| {
                        editor.write().toggle_draw(DrawKind::Point);
                    },
                    "Add Point"
                }
                button {
                    class: tool_class(tool, DrawKind::Polygon),
                    onclick: move |_| {
                        editor.write().toggle_draw(DrawKind::Polygon);
                    },
                    "Add Polygon"
                }
            }
            p { class: "hint",
                "{counts.0} points, {counts.1} polygons, {counts.2} path segments"
            }
        }

        div { class: "panel",
            h3 { "Selected feature" }
            if let Some((id, kind, name)) = selected {
                div { class: "feature-editor",
                    span { class: "feature-kind", "{kind} {id}" }
                    NameEditor { key: "{id}", editor, initial: name }
                    button {
                        class: "danger",
                        onclick: move |_| {
                            let mut ed = editor.write();
                            if let Err(e) = ed.delete_selected() {
                                ed.notify(Notice::warning(e.to_string()));
                            }
                        },
                        "Delete"
                    }
                }
            } else {
                p { class: "hint", "Click a point or polygon to edit it." }
            }
        }

        div { class: "panel",
            h3 { "Actions" }
            div { class: "tool-row",
                button {
                    disabled: route_pending,
                    onclick: move |_| {
                        let Ok(request) = editor.write().request_path() else {
                            return;
                        };
                        spawn(async move {
                            let result = fetch_route(&GatewayRoutes, &request).await;
                            editor.write().apply_route(request.token, result);
                        });
                    },
                    if route_pending { "Routing..." } else { "Create Path" }
                }
                button {
                    class: "secondary",
                    onclick: move |_| {
                        let exported = editor.read().export_geojson();
                        let text = exported
                            .map_err(|e| e.to_string())
                            .and_then(|fc| serde_json::to_string_pretty(&fc).map_err(|e| e.to_string()));
                        match text {
                            Ok(text) => copy_to_clipboard(editor, text),
                            Err(e) => editor.write().notify(Notice::warning(e)),
                        }
                    },
                    "Copy GeoJSON"
                }
                button {
                    disabled: saving,
                    onclick: move |_| on_save.call(()),
                    if saving { "Saving..." } else { "Save" }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_class_marks_active_tool() {
        let tool = Tool::Drawing(DrawKind::Polygon);
        assert_eq!(tool_class(tool, DrawKind::Polygon), "tool active");
        assert_eq!(tool_class(tool, DrawKind::Point), "tool");
        assert_eq!(tool_class(Tool::Idle, DrawKind::Point), "tool");
    }
}
