use leptos::prelude::*;
use leptos_router::components::*;
use leptos_router::path;

use crate::components::sidebar::Sidebar;
use crate::config::WidgetConfig;
use crate::pages::pipeline::MeshPipelinePage;
use crate::pages::uploader::UploaderPage;

#[component]
pub fn App(
    /// Remote service and run settings shared by every page.
    #[prop(optional)]
    config: Option<WidgetConfig>,
) -> impl IntoView {
    provide_context(config.unwrap_or_default());

    view! {
        <Router>
            <div class="app-layout">
                <Sidebar />
                <main class="content">
                    <Routes fallback=|| view! { <p>"Page not found"</p> }>
                        <Route path=path!("/") view=MeshPipelinePage />
                        <Route path=path!("/uploader") view=UploaderPage />
                    </Routes>
                </main>
            </div>
        </Router>
    }
}
