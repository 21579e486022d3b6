//! CLI command implementations

pub mod assets;
pub mod audit;
pub mod docs;
pub mod doctor;
pub mod icons;
pub mod package;
pub mod pipeline;
pub mod prepare;
pub mod ui_audit;
pub mod validate_assets;
