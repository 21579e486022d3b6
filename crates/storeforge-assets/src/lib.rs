//! StoreForge asset backend.
//!
//! Everything that touches pixels lives here: the deterministic PNG writer,
//! the dimension transformer (center-crop then scale to exact store sizes),
//! the source classifier, the numbered screenshot sequence, the asset
//! generator, the read-only asset validator, and the bootstrap icon
//! renderer. The store contract itself (names, dimensions, count bounds)
//! comes from `storeforge-spec`; this crate never carries its own copy.

pub mod classify;
pub mod generate;
pub mod icon_render;
pub mod png;
pub mod probe;
pub mod sequence;
pub mod transform;
pub mod validate;

pub use classify::{classify, Classification, Overrides};
pub use generate::{generate, GenerateConfig, GenerateSummary, ScreenshotPolicy};
pub use validate::{validate_tree, AssetCheck, AssetReport};
