use leptos::html::Input;
use leptos::prelude::*;

use crate::media::IMAGE_ACCEPT;

/// "Upload Image" button over a hidden file input. Photos can also be
/// dropped onto it.
#[component]
pub fn FilePicker(
    /// Called with the chosen file. Choosing the same file twice fires twice.
    on_pick: Callback<web_sys::File>,
) -> impl IntoView {
    let input_ref = NodeRef::<Input>::new();
    let (is_over, set_is_over) = signal(false);

    let on_button_click = move |_| {
        if let Some(input) = input_ref.get() {
            input.click();
        }
    };

    let on_input_change = move |ev: web_sys::Event| {
        let input: web_sys::HtmlInputElement = event_target(&ev);
        if let Some(file) = input.files().and_then(|files| files.get(0)) {
            on_pick.run(file);
        }
        // Clear so picking the same file again still fires `change`.
        input.set_value("");
    };

    let on_drop = move |ev: web_sys::DragEvent| {
        ev.prevent_default();
        set_is_over.set(false);
        if let Some(file) = ev
            .data_transfer()
            .and_then(|dt| dt.files())
            .and_then(|files| files.get(0))
        {
            on_pick.run(file);
        }
    };

    view! {
        <div
            class="drop-zone"
            class:drop-zone-active=move || is_over.get()
            on:dragover=move |ev: web_sys::DragEvent| {
                ev.prevent_default();
                set_is_over.set(true);
            }
            on:dragleave=move |_| set_is_over.set(false)
            on:drop=on_drop
        >
            <input
                type="file"
                accept=IMAGE_ACCEPT
                style="display: none"
                node_ref=input_ref
                on:change=on_input_change
            />
            <button class="btn btn-primary" on:click=on_button_click>
                "Upload Image"
            </button>
            <p class="drop-hint">"or drop a photo here"</p>
        </div>
    }
}
