pub mod file_picker;
pub mod image_uploader;
pub mod sidebar;
pub mod stage_indicator;
