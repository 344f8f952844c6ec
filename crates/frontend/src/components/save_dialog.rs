use dioxus::prelude::*;
use futures::channel::oneshot;

/// A name prompt waiting for the user.
pub struct PendingPrompt {
    pub default_name: String,
    reply: oneshot::Sender<Option<String>>,
}

impl PendingPrompt {
    /// Resolve the prompt. Blank names count as a cancel.
    pub fn answer(self, name: Option<&str>) {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        let _ = self.reply.send(name);
    }
}

/// Handle used by the page to ask for a project name and await the answer.
#[derive(Clone, Copy, PartialEq)]
pub struct SaveDialogHandle {
    pub pending: Signal<Option<PendingPrompt>>,
}

impl SaveDialogHandle {
    /// Open the dialog and wait for a name. `None` when cancelled, or when a
    /// newer prompt replaced this one.
    pub async fn ask(mut self, default_name: &str) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        let replaced = self.pending.write().replace(PendingPrompt {
            default_name: default_name.to_string(),
            reply: tx,
        });
        if let Some(old) = replaced {
            old.answer(None);
        }
        rx.await.ok().flatten()
    }
}

pub fn use_save_dialog() -> SaveDialogHandle {
    SaveDialogHandle {
        pending: use_signal(|| None),
    }
}

#[component]
pub fn SaveDialog(handle: SaveDialogHandle) -> Element {
    let mut pending = handle.pending;
    let mut name = use_signal(String::new);

    // Seed the input once per prompt.
    use_effect(move || {
        let seed = pending
            .read()
            .as_ref()
            .map(|p| p.default_name.clone())
            .unwrap_or_default();
        name.set(seed);
    });

    let default_name = pending.read().as_ref().map(|p| p.default_name.clone());
    let Some(default_name) = default_name else {
        return rsx! {};
    };

    let mut submit = move || {
        if let Some(prompt) = pending.take() {
            let value = name.read().clone();
            prompt.answer(Some(&value));
        }
    };

    rsx! {
        div { class: "modal-backdrop",
            div { class: "modal",
                h3 { "Save map" }
                label { r#for: "project-name", "Project name" }
                input {
                    id: "project-name",
                    r#type: "text",
                    placeholder: "{default_name}",
                    value: "{name}",
                    autofocus: true,
                    oninput: move |evt: Event<FormData>| name.set(evt.value()),
                    onkeydown: move |evt: Event<KeyboardData>| {
                        if evt.key() == Key::Enter {
                            submit();
                        }
                    },
                }
                div { class: "modal-actions",
                    button {
                        class: "secondary",
                        onclick: move |_| {
                            if let Some(prompt) = pending.take() {
                                prompt.answer(None);
                            }
                        },
                        "Cancel"
                    }
                    button {
                        disabled: name.read().trim().is_empty(),
                        onclick: move |_| submit(),
                        "Save"
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    fn prompt() -> (PendingPrompt, oneshot::Receiver<Option<String>>) {
        let (tx, rx) = oneshot::channel();
        (
            PendingPrompt {
                default_name: "Untitled map".into(),
                reply: tx,
            },
            rx,
        )
    }

    #[test]
    fn test_answer_trims_name() {
        let (p, rx) = prompt();
        p.answer(Some("  Flood survey "));
        assert_eq!(block_on(rx).unwrap(), Some("Flood survey".to_string()));
    }

    #[test]
    fn test_blank_answer_is_cancel() {
        let (p, rx) = prompt();
        p.answer(Some("   "));
        assert_eq!(block_on(rx).unwrap(), None);
    }

    #[test]
    fn test_cancel() {
        let (p, rx) = prompt();
        p.answer(None);
        assert_eq!(block_on(rx).unwrap(), None);
    }

    #[test]
    fn test_dropped_prompt_resolves_receiver() {
        let (p, rx) = prompt();
        drop(p);
        assert!(block_on(rx).is_err());
    }
}
