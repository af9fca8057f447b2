use leptos::prelude::*;

use crate::components::image_uploader::ImageUploader;

#[component]
pub fn UploaderPage() -> impl IntoView {
    view! {
        <div class="page uploader-page">
            <h2>"Image Upload"</h2>
            <p class="page-description">"Pick an image to check that it can be read in the browser."</p>
            <ImageUploader />
        </div>
    }
}
