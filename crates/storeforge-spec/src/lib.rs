//! StoreForge canonical contract library.
//!
//! This crate provides the types shared by every stage of the release
//! pipeline: the store-asset contract (exact output names, dimensions, and
//! count bounds), the extension manifest model, the stage/report types the
//! orchestrator threads through a run, and the error taxonomy with its fixed
//! cause-to-remediation table.
//!
//! # Overview
//!
//! The asset contract in [`asset_spec`] is the single source of truth for
//! both asset generation and asset validation; the two sides must never
//! drift. A run is described by a [`report::PipelineReport`], an explicit
//! accumulator value (never ambient state) that is rendered once as the
//! human-readable release summary.
//!
//! # Modules
//!
//! - [`asset_spec`]: output names, exact dimensions, screenshot grammar
//! - [`error`]: the stage error taxonomy and remediation lookup
//! - [`manifest`]: extension manifest model and icon-mapping patch
//! - [`report`]: stage order, dispositions, and the run report

pub mod asset_spec;
pub mod error;
pub mod manifest;
pub mod report;

pub use asset_spec::{
    parse_screenshot_filename, parse_size, screenshot_filename, AssetSpec, FIXED_ASSETS,
    DEFAULT_SCREENSHOT_SIZE, ICON_NAME, ICON_SIZE, MARQUEE_NAME, MARQUEE_SIZE, MAX_SCREENSHOTS,
    MIN_SCREENSHOTS, SCREENSHOT_SIZES, SMALL_PROMO_NAME, SMALL_PROMO_SIZE,
};
pub use error::{FailureClass, StageError};
pub use manifest::{IconPatch, Manifest, RUNTIME_ICON_SIZES};
pub use report::{PipelineReport, Stage, StageOutcome, StageStatus};
