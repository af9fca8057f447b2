use leptos::prelude::*;

#[component]
pub fn Sidebar() -> impl IntoView {
    view! {
        <nav class="sidebar">
            <div class="sidebar-header">
                <h1 class="sidebar-title">"Meshlift"</h1>
                <p class="sidebar-subtitle">"Photo to 3D Model"</p>
            </div>
            <ul class="nav-list">
                <li class="nav-item">
                    <a href="/" class="nav-link">"Generate Model"</a>
                </li>
                <li class="nav-item">
                    <a href="/uploader" class="nav-link">"Image Upload"</a>
                </li>
            </ul>
        </nav>
    }
}
