use dioxus::prelude::*;

use crate::api::{self, ProjectData};
use crate::Route;

/// `2024-05-01T10:20:30.123+00:00` -> `2024-05-01 10:20`.
fn short_timestamp(ts: &str) -> String {
    match (ts.get(..10), ts.get(11..16)) {
        (Some(date), Some(time)) => format!("{date} {time}"),
        _ => ts.to_string(),
    }
}

#[component]
fn IdentityBox(user: Signal<Option<String>>) -> Element {
    let mut user = user;
    let mut input = use_signal(String::new);
    let mut error = use_signal(|| None::<String>);

    let current = user.read().clone();
    rsx! {
        div { class: "panel identity",
            if let Some(id) = current {
                span { "Signed in as " strong { "{id}" } }
                button {
                    class: "secondary",
                    onclick: move |_| {
                        error.set(api::set_current_user(None).err());
                        user.set(api::current_user());
                    },
                    "Sign out"
                }
            } else {
                input {
                    r#type: "text",
                    placeholder: "User id",
                    value: "{input}",
                    oninput: move |evt: Event<FormData>| input.set(evt.value()),
                }
                button {
                    disabled: input.read().trim().is_empty(),
                    onclick: move |_| {
                        let id = input.read().trim().to_string();
                        match api::set_current_user(Some(&id)) {
                            Ok(()) => input.set(String::new()),
                            Err(e) => error.set(Some(e)),
                        }
                        user.set(api::current_user());
                    },
                    "Sign in"
                }
            }
            if let Some(err) = error.read().clone() {
                span { class: "error-text", "{err}" }
            }
        }
    }
}

#[component]
fn ProjectRow(project: ProjectData, on_changed: EventHandler<Result<(), String>>) -> Element {
    let mut renaming = use_signal(|| None::<String>);
    let id = project.id.clone();

    rsx! {
        li { class: "project-row",
            if let Some(draft) = renaming.read().clone() {
                input {
                    r#type: "text",
                    value: "{draft}",
                    oninput: move |evt: Event<FormData>| renaming.set(Some(evt.value())),
                }
                button {
                    onclick: {
                        let id = id.clone();
                        move |_| {
                            let id = id.clone();
                            let name = renaming.read().clone().unwrap_or_default();
                            spawn(async move {
                                let result = api::rename_project(&id, &name).await.map(|_| ());
                                renaming.set(None);
                                on_changed.call(result);
                            });
                        }
                    },
                    "Save"
                }
                button { class: "secondary", onclick: move |_| renaming.set(None), "Cancel" }
            } else {
                Link { class: "project-name", to: Route::MapView { id: id.clone() }, "{project.name}" }
                span { class: "project-date", "{short_timestamp(&project.updated_at)}" }
                button {
                    class: "secondary small",
                    onclick: {
                        let name = project.name.clone();
                        move |_| renaming.set(Some(name.clone()))
                    },
                    "Rename"
                }
                button {
                    class: "danger small",
                    onclick: {
                        let id = id.clone();
                        move |_| {
                            let id = id.clone();
                            spawn(async move {
                                let result = api::delete_project(&id).await.map(|_| ());
                                on_changed.call(result);
                            });
                        }
                    },
                    "Delete"
                }
            }
        }
    }
}

#[component]
pub fn Projects() -> Element {
    let user = use_signal(api::current_user);
    let mut refresh = use_signal(|| 0u64);
    let mut action_error = use_signal(|| None::<String>);

    let projects = use_resource(move || {
        let signed_in = user.read().is_some();
        let _ = refresh.read();
        async move {
            if !signed_in {
                return Ok(Vec::new());
            }
            api::fetch_projects().await
        }
    });

    let on_changed = move |result: Result<(), String>| {
        action_error.set(result.err());
        refresh += 1;
    };

    let signed_in = user.read().is_some();
    rsx! {
        div { class: "page projects-page",
            div { class: "header",
                h1 { "Bhuvan Map Editor" }
                nav { class: "header-links",
                    Link { to: Route::CentralDb {}, "Data explorer" }
                    Link { to: Route::PersonalDb {}, "Personal data" }
                    Link { to: Route::Demo {}, "API demo" }
                    Link { class: "button", to: Route::Editor {}, "New map" }
                }
            }
            IdentityBox { user }
            if let Some(err) = action_error.read().clone() {
                div { class: "error-banner", "{err}" }
            }
            if signed_in {
                div { class: "panel",
                    h3 { "Your projects" }
                    match &*projects.read() {
                        None => rsx! { p { class: "hint", "Loading..." } },
                        Some(Err(e)) => rsx! { div { class: "error-banner", "{e}" } },
                        Some(Ok(list)) if list.is_empty() => rsx! {
                            p { class: "hint", "No saved maps yet." }
                        },
                        Some(Ok(list)) => rsx! {
                            ul { class: "project-list",
                                for project in list.iter().cloned() {
                                    ProjectRow { key: "{project.id}", project, on_changed }
                                }
                            }
                        },
                    }
                }
            } else {
                p { class: "hint", "Sign in with your user id to see your saved maps." }
            }
        }
    }
}
