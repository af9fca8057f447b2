use std::rc::Rc;

use leptos::prelude::*;
use tracing::{debug, error};
use wasm_bindgen_futures::spawn_local;

use crate::components::file_picker::FilePicker;
use crate::components::stage_indicator::StageIndicator;
use crate::config::WidgetConfig;
use crate::display::WebObjectUrls;
use crate::error::PipelineError;
use crate::media::read_file;
use crate::pipeline::{Pipeline, PipelineSnapshot};
use crate::remote::{GradioConnector, InferenceClient, ReqwestTransport};
use crate::viewer::ModelViewer;

type WebPipeline = Pipeline<GradioConnector<ReqwestTransport>, ReqwestTransport, WebObjectUrls>;

/// Photo in, spinning 3D model out.
#[component]
pub fn MeshPipelinePage() -> impl IntoView {
    let config = use_context::<WidgetConfig>().unwrap_or_default();

    let options = match config.validate() {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid widget configuration: {}", e);
            return view! {
                <div class="page mesh-pipeline-page">
                    <h2>"Generate a 3D Model"</h2>
                    <p class="error-message">{format!("Invalid configuration: {}", e)}</p>
                </div>
            }
            .into_any();
        }
    };

    let (snapshot, set_snapshot) = signal(PipelineSnapshot::default());

    let transport = ReqwestTransport::new();
    let client = InferenceClient::new(
        GradioConnector::new(transport.clone(), config.hub_url.clone()),
        config.space.clone(),
    );
    let pipeline: WebPipeline = Pipeline::new(client, transport, WebObjectUrls, options)
        .on_change(move |snapshot| {
            set_snapshot.try_set(snapshot.clone());
        });
    let pipeline = StoredValue::new_local(Rc::new(pipeline));

    on_cleanup(move || {
        pipeline.try_with_value(|pipeline| pipeline.teardown());
    });

    // The token is reserved before the read so pick order decides which run wins.
    let on_pick = Callback::new(move |file: web_sys::File| {
        let Some(pipeline) = pipeline.try_get_value() else {
            return;
        };
        let token = pipeline.reserve();
        spawn_local(async move {
            let outcome = match read_file(&file).await {
                Ok(upload) => pipeline.process_reserved(token, upload).await,
                Err(e) => pipeline.reject(token, &file.name(), PipelineError::Read(e.to_string())),
            };
            debug!("Run finished: {:?}", outcome);
        });
    });

    let stage = Signal::derive(move || snapshot.with(|s| s.stage.clone()));
    let file_name = Memo::new(move |_| snapshot.with(|s| s.file_name.clone()));
    let original_src = Memo::new(move |_| snapshot.with(|s| s.original_src.clone()));
    let processed_src = Memo::new(move |_| snapshot.with(|s| s.processed_src.clone()));
    let asset_url = Memo::new(move |_| snapshot.with(|s| s.asset_url.clone()));
    let rotation_speed = config.rotation_speed;

    view! {
        <div class="page mesh-pipeline-page">
            <style>{include_str!("pipeline.css")}</style>

            <h2>"Generate a 3D Model"</h2>
            <p class="page-description">
                "Upload a photo of an object. Its background is removed and a 3D model is generated from it."
            </p>

            <FilePicker on_pick=on_pick />
            {move || file_name.get().map(|name| view! {
                <p class="upload-name">"Image uploaded: " {name}</p>
            })}
            <StageIndicator stage=stage />

            <div class="result-panes">
                {move || original_src.get().map(|src| view! {
                    <div class="result-pane">
                        <h3>"Original Image:"</h3>
                        <img src=src alt="Original" class="pane-image" />
                    </div>
                })}
                {move || processed_src.get().map(|src| view! {
                    <div class="result-pane">
                        <h3>"Processed Image:"</h3>
                        <img src=src alt="Processed" class="pane-image" />
                    </div>
                })}
                {move || asset_url.get().map(|url| {
                    let failed_url = url.clone();
                    let on_error = Callback::new(move |message: String| {
                        pipeline.try_with_value(|pipeline| pipeline.report_asset_failure(&failed_url, &message));
                    });
                    view! {
                        <div class="result-pane">
                            <h3>"3D Model:"</h3>
                            <ModelViewer url=url rotation_speed=rotation_speed on_error=on_error />
                        </div>
                    }
                })}
            </div>
        </div>
    }
    .into_any()
}
