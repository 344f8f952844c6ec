use std::time::Duration;

use bhuvan_shared::editor::{MapEditor, Notice, NoticeLevel};
use dioxus::prelude::*;
use gloo_timers::future::sleep;

const DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
struct Toast {
    id: u64,
    notice: Notice,
}

fn level_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "toast info",
        NoticeLevel::Warning => "toast warning",
        NoticeLevel::Error => "toast error",
    }
}

/// Toasts for the editor's notice queue. Each one closes itself after a few
/// seconds or on click.
#[component]
pub fn Notices(mut editor: Signal<MapEditor>) -> Element {
    let mut toasts = use_signal(Vec::<Toast>::new);
    let mut next_id = use_signal(|| 0u64);

    use_effect(move || {
        if editor.read().notices().is_empty() {
            return;
        }
        let drained = editor.write().take_notices();
        for notice in drained {
            let id = *next_id.peek();
            next_id.set(id + 1);
            toasts.write().push(Toast { id, notice });
            spawn(async move {
                sleep(DISMISS_AFTER).await;
                toasts.write().retain(|t| t.id != id);
            });
        }
    });

    rsx! {
        div { class: "toasts",
            for toast in toasts.read().iter().cloned() {
                div {
                    key: "{toast.id}",
                    class: level_class(toast.notice.level),
                    role: "status",
                    onclick: move |_| toasts.write().retain(|t| t.id != toast.id),
                    "{toast.notice.message}"
                }
            }
        }
    }
}
