use bhuvan_shared::projection::LonLat;
use dioxus::prelude::*;
use serde_json::Value;

use crate::api;
use crate::Route;

fn parse_number(label: &str, text: &str) -> Result<f64, String> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{label} must be a number"))
}

fn parse_position(lat: &str, lon: &str) -> Result<LonLat, String> {
    Ok(LonLat::new(
        parse_number("Longitude", lon)?,
        parse_number("Latitude", lat)?,
    ))
}

fn render_result(result: &Option<Result<Value, String>>) -> String {
    match result {
        None => "No data yet".to_string(),
        Some(Ok(v)) => serde_json::to_string_pretty(v).unwrap_or_default(),
        Some(Err(e)) => format!("Error: {e}"),
    }
}

#[component]
fn ResultBlock(title: String, text: String) -> Element {
    rsx! {
        div { class: "panel",
            h3 { "{title}" }
            pre { class: "json-output", "{text}" }
        }
    }
}

#[component]
fn NumberInput(label: String, value: Signal<String>) -> Element {
    let mut value = value;
    rsx! {
        input {
            r#type: "number",
            step: "any",
            placeholder: "{label}",
            value: "{value}",
            oninput: move |evt: Event<FormData>| value.set(evt.value()),
        }
    }
}

/// Try the Bhuvan services behind the gateway as the signed-in user.
#[component]
pub fn GatewayDemo() -> Element {
    let start_lat = use_signal(|| "29.66".to_string());
    let start_lon = use_signal(|| "77.63".to_string());
    let end_lat = use_signal(|| "25.33".to_string());
    let end_lon = use_signal(|| "82.70".to_string());
    let thematic_lat = use_signal(|| "23".to_string());
    let thematic_lon = use_signal(|| "77".to_string());
    let mut year = use_signal(|| "2004_05".to_string());
    let mut village = use_signal(|| "seKuRu".to_string());
    let mut tile_id = use_signal(|| "cdnc43e".to_string());

    let mut routing = use_signal(|| None::<Result<Value, String>>);
    let mut thematic = use_signal(|| None::<Result<Value, String>>);
    let mut geocoded = use_signal(|| None::<Result<Value, String>>);
    let mut download = use_signal(|| None::<Result<(), String>>);

    rsx! {
        div { class: "page demo-page",
            div { class: "header",
                h1 { "Bhuvan API Demo" }
                Link { to: Route::Home {}, "Projects" }
            }
            div { class: "demo-grid",
                div { class: "panel",
                    h3 { "Routing" }
                    div { class: "input-grid",
                        NumberInput { label: "Start latitude", value: start_lat }
                        NumberInput { label: "Start longitude", value: start_lon }
                        NumberInput { label: "End latitude", value: end_lat }
                        NumberInput { label: "End longitude", value: end_lon }
                    }
                    button {
                        onclick: move |_| {
                            let from = parse_position(&start_lat.read(), &start_lon.read());
                            let to = parse_position(&end_lat.read(), &end_lon.read());
                            spawn(async move {
                                let result = match (from, to) {
                                    (Ok(from), Ok(to)) => api::routing(from, to).await,
                                    (Err(e), _) | (_, Err(e)) => Err(e),
                                };
                                routing.set(Some(result));
                            });
                        },
                        "Fetch route"
                    }
                }
                div { class: "panel",
                    h3 { "Thematic (LULC)" }
                    div { class: "input-grid",
                        NumberInput { label: "Latitude", value: thematic_lat }
                        NumberInput { label: "Longitude", value: thematic_lon }
                        input {
                            r#type: "text",
                            placeholder: "Year (YYYY_YY)",
                            value: "{year}",
                            oninput: move |evt: Event<FormData>| year.set(evt.value()),
                        }
                    }
                    button {
                        onclick: move |_| {
                            let at = parse_position(&thematic_lat.read(), &thematic_lon.read());
                            let year = year.read().clone();
                            spawn(async move {
                                let result = match at {
                                    Ok(at) => api::thematic(at.lat, at.lon, &year).await,
                                    Err(e) => Err(e),
                                };
                                thematic.set(Some(result));
                            });
                        },
                        "Fetch thematic data"
                    }
                }
                div { class: "panel",
                    h3 { "Village geocoding" }
                    input {
                        r#type: "text",
                        placeholder: "Village name",
                        value: "{village}",
                        oninput: move |evt: Event<FormData>| village.set(evt.value()),
                    }
                    button {
                        onclick: move |_| {
                            let name = village.read().clone();
                            spawn(async move {
                                geocoded.set(Some(api::village_geocode(&name).await));
                            });
                        },
                        "Geocode village"
                    }
                }
                div { class: "panel",
                    h3 { "Ellipsoid to geoid" }
                    input {
                        r#type: "text",
                        placeholder: "Tile id",
                        value: "{tile_id}",
                        oninput: move |evt: Event<FormData>| tile_id.set(evt.value()),
                    }
                    button {
                        onclick: move |_| {
                            let id = tile_id.read().clone();
                            spawn(async move {
                                let result = api::download_ellipsoid(&id).await;
                                if let Err(e) = &result {
                                    tracing::warn!(tile = %id, error = %e, "ellipsoid download failed");
                                }
                                download.set(Some(result));
                            });
                        },
                        "Download archive"
                    }
                    match download.read().clone() {
                        Some(Ok(())) => rsx! { p { class: "hint", "Download started." } },
                        Some(Err(e)) => rsx! { p { class: "error-text", "Download failed: {e}" } },
                        None => rsx! {},
                    }
                }
            }
            ResultBlock { title: "Routing data", text: render_result(&routing.read()) }
            ResultBlock { title: "Thematic data", text: render_result(&thematic.read()) }
            ResultBlock { title: "Village geocoding", text: render_result(&geocoded.read()) }
        }
    }
}
