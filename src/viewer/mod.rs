//! Interactive 3D view of the generated model.

pub mod asset;
pub mod camera;
mod component;
pub mod material;
pub mod renderer;
mod session;

use thiserror::Error;

use crate::remote::TransportError;

pub use asset::{load_glb, AssetError, LoadedModel};
pub use camera::{ModelSpin, OrbitCamera};
pub use component::ModelViewer;
pub use material::{normalize_material, SourceMaterial, StandardMaterial};
pub use renderer::{GlRenderer, SceneLights};
pub use session::ViewerSession;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Could not download the model: {0}")]
    Fetch(#[from] TransportError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("WebGL error: {0}")]
    Gl(String),

    #[error("WebGL2 is not available in this browser")]
    Unsupported,
}
