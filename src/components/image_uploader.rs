use leptos::prelude::*;
use tracing::{error, info};
use wasm_bindgen_futures::spawn_local;

use super::file_picker::FilePicker;
use crate::media::read_file;

/// Picks an image and reports it; nothing is sent anywhere.
#[component]
pub fn ImageUploader() -> impl IntoView {
    let (file_name, set_file_name) = signal::<Option<String>>(None);

    let on_pick = Callback::new(move |file: web_sys::File| {
        set_file_name.set(Some(file.name()));
        spawn_local(async move {
            match read_file(&file).await {
                Ok(blob) => info!("Image as blob: {:?}", blob),
                Err(e) => error!("{}", e),
            }
        });
    });

    view! {
        <div class="image-uploader">
            <FilePicker on_pick=on_pick />
            {move || file_name.get().map(|name| view! {
                <p class="upload-name">"Image uploaded: " {name}</p>
            })}
        </div>
    }
}
