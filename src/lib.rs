//! Browser widgets that turn a photo into an interactive 3D model using a
//! hosted image-to-3D service.

pub mod app;
pub mod components;
pub mod config;
pub mod display;
pub mod error;
pub mod media;
pub mod pages;
pub mod pipeline;
pub mod remote;
pub mod viewer;

pub use config::WidgetConfig;
pub use error::PipelineError;
