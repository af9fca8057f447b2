use leptos::prelude::*;

use crate::pipeline::PipelineStage;

/// Badge class for a stage.
fn badge(stage: &PipelineStage) -> (&'static str, &'static str) {
    match stage {
        PipelineStage::Idle => ("\u{2022}", "status-badge status-unknown"),
        PipelineStage::Rendered => ("\u{2713}", "status-badge status-pass"),
        PipelineStage::Failed(_) => ("\u{2717}", "status-badge status-fail"),
        _ => ("\u{2026}", "status-badge status-busy"),
    }
}

/// One-line status of the pipeline: the stage label, or why it failed.
#[component]
pub fn StageIndicator(#[prop(into)] stage: Signal<PipelineStage>) -> impl IntoView {
    view! {
        <div class="stage-indicator">
            {move || {
                let stage = stage.get();
                let (icon, class) = badge(&stage);
                let detail = match &stage {
                    PipelineStage::Failed(report) => report.message.clone(),
                    _ => String::new(),
                };
                view! {
                    <span class=class>{icon}</span>
                    <span class="stage-name">{stage.label()}</span>
                    <span class="stage-detail">{detail}</span>
                }
            }}
        </div>
    }
}
