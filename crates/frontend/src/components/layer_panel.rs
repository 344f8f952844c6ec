use bhuvan_shared::catalog::{CatalogLayer, LayerKind};
use bhuvan_shared::editor::{AddOutcome, LayerRef, MapEditor};
use dioxus::prelude::*;

use crate::components::map_canvas::fetch_geojson_layer;

fn catalog_ref(layer: &CatalogLayer) -> LayerRef {
    match layer.kind {
        LayerKind::Wms => LayerRef::wms(&layer.url, &layer.name),
        LayerKind::VectorTile => LayerRef::vector_tile(&layer.url, &layer.name),
        LayerKind::ExternalGeoJson => LayerRef::geojson(&layer.url),
    }
}

/// Add `layer` to the editor and start its feature fetch if it is GeoJSON.
/// Validation problems end up on the notice queue.
pub fn activate_layer(mut editor: Signal<MapEditor>, layer: LayerRef) -> bool {
    let outcome = editor.write().add_layer(layer);
    match outcome {
        Ok(AddOutcome::Added(id)) => {
            let fetch = editor
                .read()
                .layers()
                .get(id)
                .filter(|l| l.layer.kind == LayerKind::ExternalGeoJson)
                .map(|l| l.layer.url.clone());
            if let Some(url) = fetch {
                fetch_geojson_layer(editor, id, url);
            }
            true
        }
        Ok(AddOutcome::AlreadyActive(_)) => true,
        Err(_) => false,
    }
}

fn kind_label(kind: LayerKind) -> &'static str {
    match kind {
        LayerKind::Wms => "WMS",
        LayerKind::VectorTile => "Vector tiles",
        LayerKind::ExternalGeoJson => "GeoJSON",
    }
}

#[component]
pub fn LayerPanel(mut editor: Signal<MapEditor>, catalog: Vec<CatalogLayer>) -> Element {
    let mut wms_url = use_signal(String::new);
    let mut wms_name = use_signal(String::new);
    let mut geojson_url = use_signal(String::new);

    let ed = editor.read();
    let entries: Vec<(CatalogLayer, bool)> = catalog
        .iter()
        .map(|l| (l.clone(), ed.layers().is_active(l.kind, catalog_ref(l).key())))
        .collect();
    let active: Vec<(LayerKind, String, bool)> = ed
        .layers()
        .iter()
        .map(|l| (l.layer.kind, l.layer.key().to_string(), l.failed))
        .collect();
    drop(ed);

    rsx! {
        div { class: "panel",
            h3 { "Layers" }
            for (layer, checked) in entries {
                label { class: "layer-option", key: "{layer.id}",
                    input {
                        r#type: "checkbox",
                        checked,
                        onchange: {
                            let layer = catalog_ref(&layer);
                            move |evt: Event<FormData>| {
                                if evt.checked() {
                                    activate_layer(editor, layer.clone());
                                } else {
                                    let _ = editor.write().remove_layer(layer.kind, layer.key());
                                }
                            }
                        },
                    }
                    span { "{layer.label}" }
                    span { class: "layer-kind", "{kind_label(layer.kind)}" }
                }
            }
        }

        div { class: "panel",
            h3 { "Custom WMS" }
            input {
                r#type: "url",
                placeholder: "https://host/wms",
                value: "{wms_url}",
                oninput: move |evt: Event<FormData>| wms_url.set(evt.value()),
            }
            input {
                r#type: "text",
                placeholder: "Layer name",
                value: "{wms_name}",
                oninput: move |evt: Event<FormData>| wms_name.set(evt.value()),
            }
            button {
                onclick: move |_| {
                    let layer = LayerRef::wms(wms_url.read().clone(), wms_name.read().clone());
                    if activate_layer(editor, layer) {
                        wms_url.set(String::new());
                        wms_name.set(String::new());
                    }
                },
                "Add WMS layer"
            }
        }

        div { class: "panel",
            h3 { "External GeoJSON" }
            input {
                r#type: "url",
                placeholder: "https://host/data.geojson",
                value: "{geojson_url}",
                oninput: move |evt: Event<FormData>| geojson_url.set(evt.value()),
            }
            button {
                onclick: move |_| {
                    let layer = LayerRef::geojson(geojson_url.read().clone());
                    if activate_layer(editor, layer) {
                        geojson_url.set(String::new());
                    }
                },
                "Load GeoJSON"
            }
        }

        if !active.is_empty() {
            div { class: "panel",
                h3 { "On the map" }
                ul { class: "active-layers",
                    for (kind, key, failed) in active {
                        li { key: "{kind}-{key}",
                            span { class: if failed { "layer-name failed" } else { "layer-name" }, "{key}" }
                            span { class: "layer-kind", "{kind_label(kind)}" }
                            button {
                                class: "secondary small",
                                onclick: {
                                    let key = key.clone();
                                    move |_| {
                                        let _ = editor.write().remove_layer(kind, &key);
                                    }
                                },
                                "Remove"
                            }
                        }
                    }
                }
            }
        }
    }
}
