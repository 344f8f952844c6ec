mod api;
mod components;
mod pages;
mod tiles;

use dioxus::prelude::*;

#[derive(Routable, Clone, PartialEq)]
enum Route {
    #[route("/")]
    Home {},
    #[route("/editor")]
    Editor {},
    #[route("/map-view/:id")]
    MapView { id: String },
    #[route("/central-db")]
    CentralDb {},
    #[route("/personal-db")]
    PersonalDb {},
    #[route("/demo")]
    Demo {},
}

#[component]
fn Home() -> Element {
    rsx! {
        pages::projects::Projects {}
    }
}

#[component]
fn Editor() -> Element {
    rsx! {
        pages::editor::EditorPage { project_id: None::<String> }
    }
}

#[component]
fn MapView(id: String) -> Element {
    rsx! {
        pages::editor::EditorPage { key: "{id}", project_id: Some(id.clone()) }
    }
}

#[component]
fn CentralDb() -> Element {
    let key = "central";
    rsx! {
        pages::query_console::QueryConsole { key: "{key}", target: api::QueryTarget::Central }
    }
}

#[component]
fn PersonalDb() -> Element {
    let key = "personal";
    rsx! {
        pages::query_console::QueryConsole { key: "{key}", target: api::QueryTarget::Personal }
    }
}

#[component]
fn Demo() -> Element {
    rsx! {
        pages::gateway_demo::GatewayDemo {}
    }
}

const CSS: Asset = asset!("/assets/main.css");
const FAVICON: Asset = asset!("/assets/favicon.svg");

#[allow(non_snake_case)]
fn App() -> Element {
    rsx! {
        document::Link { rel: "icon", r#type: "image/svg+xml", href: FAVICON }
        document::Stylesheet { href: CSS }
        Router::<Route> {}
    }
}

fn main() {
    launch(App);
}
