use leptos::html::Canvas;
use leptos::prelude::*;
use tracing::error;
use wasm_bindgen_futures::spawn_local;

use super::session::ViewerSession;

#[derive(Debug, Clone, PartialEq)]
enum ViewerStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Hand `message` to `on_error`. Loading can outlive the viewer, so the
/// callback may already be disposed; returns whether it ran.
fn forward_error(on_error: Option<Callback<String>>, message: String) -> bool {
    on_error.is_some_and(|on_error| on_error.try_run(message).is_some())
}

/// Canvas showing the model at `url`, slowly spinning, with orbit/zoom/pan
/// mouse controls. Mount a new viewer for each model.
#[component]
pub fn ModelViewer(
    /// Location of a binary glTF (GLB) model.
    #[prop(into)]
    url: String,
    /// Model rotation in radians per second.
    #[prop(default = 0.5)]
    rotation_speed: f32,
    /// Called with a message when the model cannot be shown.
    #[prop(optional)]
    on_error: Option<Callback<String>>,
) -> impl IntoView {
    let canvas_ref = NodeRef::<Canvas>::new();
    let (status, set_status) = signal(ViewerStatus::Loading);
    let session = StoredValue::new_local(None::<ViewerSession>);
    let started = StoredValue::new(false);

    Effect::new(move |_| {
        let Some(canvas) = canvas_ref.get() else {
            return;
        };
        if started.get_value() {
            return;
        }
        started.set_value(true);

        let url = url.clone();
        spawn_local(async move {
            match ViewerSession::start(canvas, &url, rotation_speed).await {
                Ok(viewer) => {
                    // The viewer may have been unmounted while loading.
                    if let Some(orphan) = session.try_set_value(Some(viewer)) {
                        if let Some(orphan) = orphan {
                            orphan.stop();
                        }
                        return;
                    }
                    set_status.try_set(ViewerStatus::Ready);
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("Failed to display model {}: {}", url, message);
                    set_status.try_set(ViewerStatus::Failed(message.clone()));
                    forward_error(on_error, message);
                }
            }
        });
    });

    on_cleanup(move || {
        if let Some(Some(viewer)) = session.try_update_value(Option::take) {
            viewer.stop();
        }
    });

    view! {
        <div class="model-viewer">
            <canvas node_ref=canvas_ref class="model-canvas"></canvas>
            {move || match status.get() {
                ViewerStatus::Loading => view! {
                    <div class="viewer-overlay">
                        <div class="spinner"></div>
                        <p>"Loading model..."</p>
                    </div>
                }.into_any(),
                ViewerStatus::Ready => view! {
                    <p class="viewer-hint">"Drag to rotate, right-drag to pan, scroll to zoom"</p>
                }.into_any(),
                ViewerStatus::Failed(message) => view! {
                    <div class="viewer-overlay viewer-error">
                        <p>{message}</p>
                    </div>
                }.into_any(),
            }}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use leptos::prelude::*;
    use leptos::reactive::owner::Owner;

    use super::forward_error;

    #[test]
    fn test_error_after_unmount_is_dropped() {
        let owner = Owner::new();
        owner.set();
        let page = owner.child();

        let received = Arc::new(AtomicUsize::new(0));
        let on_error = page.with(|| {
            let received = received.clone();
            Callback::new(move |_: String| {
                received.fetch_add(1, Ordering::SeqCst);
            })
        });

        assert!(forward_error(Some(on_error), "bad header".to_string()));
        page.cleanup();
        assert!(!forward_error(Some(on_error), "late failure".to_string()));
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_without_listener() {
        assert!(!forward_error(None, "bad header".to_string()));
    }
}
