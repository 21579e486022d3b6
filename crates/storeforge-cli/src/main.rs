//! StoreForge CLI - Chrome extension release automation
//!
//! This binary provides commands for preparing, auditing, packaging, and
//! generating store-listing assets for a browser extension, plus the full
//! release pipeline that sequences them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use storeforge_cli::capture::DEFAULT_CAPTURE_COMMAND;
use storeforge_cli::commands;
use storeforge_cli::commands::pipeline::PipelineOptions;
use storeforge_spec::parse_size;

/// StoreForge - Browser Extension Release Automation
#[derive(Parser)]
#[command(name = "storeforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full release pipeline (checks, audits, package, assets, docs)
    Pipeline {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Manifest path relative to --root
        #[arg(long, default_value = "manifest.json")]
        manifest: String,

        /// Skip the extension icon bootstrap stage
        #[arg(long)]
        skip_icon_bootstrap: bool,

        /// Skip manifest/JS development checks
        #[arg(long)]
        skip_dev_checks: bool,

        /// Skip only the JS syntax probe within dev checks
        #[arg(long)]
        skip_js_check: bool,

        /// Skip the popup UI audit stage
        #[arg(long)]
        skip_ui_audit: bool,

        /// Skip baseline prep (privacy policy, .gitignore)
        #[arg(long)]
        skip_prepare: bool,

        /// Skip the permission audit stage
        #[arg(long)]
        skip_audit: bool,

        /// Skip extension packaging
        #[arg(long)]
        skip_package: bool,

        /// Skip store asset generation and validation
        #[arg(long)]
        skip_assets: bool,

        /// Skip listing draft generation
        #[arg(long)]
        skip_docs: bool,

        /// Input image paths for asset generation
        #[arg(long, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Explicit icon source image path
        #[arg(long)]
        icon_source: Option<PathBuf>,

        /// Override source image for the small promo tile
        #[arg(long)]
        small_promo_source: Option<PathBuf>,

        /// Override source image for the marquee tile
        #[arg(long)]
        marquee_source: Option<PathBuf>,

        /// Generate the optional marquee asset
        #[arg(long)]
        include_marquee: bool,

        /// Allow icon fallback from a single non-icon input image
        #[arg(long)]
        allow_icon_fallback: bool,

        /// Screenshot size, e.g. 1280x800 or 640x400
        #[arg(long, default_value = "1280x800", value_parser = parse_size)]
        screenshot_size: (u32, u32),

        /// Maximum screenshots to generate (1-5)
        #[arg(long, default_value_t = 5)]
        max_screenshots: usize,

        /// Clear existing screenshots and renumber from 1
        #[arg(long)]
        overwrite_screenshots: bool,

        /// Capture screenshots before asset generation
        #[arg(long)]
        capture_screenshots: bool,

        /// Disable automatic screenshot capture when --inputs is missing
        #[arg(long)]
        no_auto_capture: bool,

        /// Screenshot capture executable
        #[arg(long, default_value = DEFAULT_CAPTURE_COMMAND)]
        capture_cmd: String,

        /// Additional URLs to capture as screenshots
        #[arg(long, num_args = 1..)]
        urls: Vec<String>,

        /// Minimum popup width requirement in px for the UI audit
        #[arg(long, default_value_t = 560)]
        min_popup_width: u32,

        /// Node executable for JS syntax checks
        #[arg(long, default_value = "node")]
        node: String,

        /// Zip output path relative to --root
        #[arg(long, default_value = "release/chrome-webstore.zip")]
        zip_out: String,

        /// Permission audit report path relative to --root
        #[arg(long, default_value = "release/permission-audit.md")]
        permission_audit_out: String,

        /// Popup UI audit report path relative to --root
        #[arg(long, default_value = "release/popup-ui-audit.md")]
        popup_audit_out: String,

        /// Listing draft output path relative to --root
        #[arg(long, default_value = "release/cws-listing.md")]
        listing_out: String,

        /// Store assets output root relative to --root
        #[arg(long, default_value = "release/store-assets")]
        assets_root: String,

        /// Pipeline summary output path relative to --root
        #[arg(long, default_value = "release/full-release-summary.md")]
        summary_out: String,
    },

    /// Generate store listing assets from source images
    Assets {
        /// One or more source image paths
        #[arg(long, required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Output root directory
        #[arg(long, default_value = "release/store-assets")]
        root: String,

        /// Screenshot size, e.g. 1280x800 or 640x400
        #[arg(long, default_value = "1280x800", value_parser = parse_size)]
        screenshot_size: (u32, u32),

        /// Maximum screenshots to generate (1-5)
        #[arg(long, default_value_t = 5)]
        max_screenshots: usize,

        /// Generate the optional marquee asset
        #[arg(long)]
        include_marquee: bool,

        /// Explicit icon source image path
        #[arg(long)]
        icon_source: Option<PathBuf>,

        /// Override source image for the small promo tile
        #[arg(long)]
        small_promo_source: Option<PathBuf>,

        /// Override source image for the marquee tile
        #[arg(long)]
        marquee_source: Option<PathBuf>,

        /// Allow icon fallback from a single non-icon input image
        #[arg(long)]
        allow_icon_fallback: bool,

        /// Clear existing screenshots and renumber from 1
        #[arg(long)]
        overwrite_screenshots: bool,
    },

    /// Validate generated store assets against the published contract
    ValidateAssets {
        /// Asset root directory
        #[arg(long, default_value = "release/store-assets")]
        root: String,

        /// Output machine-readable JSON report
        #[arg(long)]
        json: bool,
    },

    /// Audit manifest permissions against source usage
    Audit {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Manifest path relative to --root
        #[arg(long, default_value = "manifest.json")]
        manifest: String,

        /// Output report path relative to --root
        #[arg(long, default_value = "release/permission-audit.md")]
        out: String,

        /// Maximum evidence lines per permission
        #[arg(long, default_value_t = 5)]
        max_evidence: usize,

        /// Exit non-zero when findings are present
        #[arg(long)]
        fail_on_missing: bool,
    },

    /// Package the extension for store upload
    Package {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Manifest path relative to --root
        #[arg(long, default_value = "manifest.json")]
        manifest: String,

        /// Output zip path relative to --root
        #[arg(long, default_value = "release/chrome-webstore.zip")]
        out: String,

        /// Additional file/dir/glob to include (repeatable)
        #[arg(long = "extra")]
        extra: Vec<String>,

        /// Additional exclude glob relative to root (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,

        /// Print included files without writing the zip
        #[arg(long)]
        dry_run: bool,
    },

    /// Ensure runtime icons exist and the manifest maps to them
    Icons {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Manifest path relative to --root
        #[arg(long, default_value = "manifest.json")]
        manifest: String,

        /// Print planned changes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Audit popup UI readiness (width wiring, icon quality)
    UiAudit {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Manifest path relative to --root
        #[arg(long, default_value = "manifest.json")]
        manifest: String,

        /// Audit report path relative to --root
        #[arg(long, default_value = "release/popup-ui-audit.md")]
        out: String,

        /// Minimum required popup width in px
        #[arg(long, default_value_t = 560)]
        min_popup_width: u32,
    },

    /// Prepare publish baseline files (privacy policy, .gitignore)
    Prepare {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Show planned changes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate a store listing draft from the manifest
    Docs {
        /// Extension root directory
        #[arg(long, default_value = ".")]
        root: String,

        /// Manifest path relative to --root
        #[arg(long, default_value = "manifest.json")]
        manifest: String,

        /// Output markdown path relative to --root
        #[arg(long, default_value = "release/cws-listing.md")]
        out: String,

        /// Explicit feature bullet (repeatable)
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Explicit single-purpose statement
        #[arg(long)]
        single_purpose: Option<String>,
    },

    /// Check system dependencies and configuration
    Doctor {
        /// Screenshot capture executable to look for
        #[arg(long, default_value = DEFAULT_CAPTURE_COMMAND)]
        capture_cmd: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pipeline {
            root,
            manifest,
            skip_icon_bootstrap,
            skip_dev_checks,
            skip_js_check,
            skip_ui_audit,
            skip_prepare,
            skip_audit,
            skip_package,
            skip_assets,
            skip_docs,
            inputs,
            icon_source,
            small_promo_source,
            marquee_source,
            include_marquee,
            allow_icon_fallback,
            screenshot_size,
            max_screenshots,
            overwrite_screenshots,
            capture_screenshots,
            no_auto_capture,
            capture_cmd,
            urls,
            min_popup_width,
            node,
            zip_out,
            permission_audit_out,
            popup_audit_out,
            listing_out,
            assets_root,
            summary_out,
        } => {
            let mut opts = PipelineOptions::new(root);
            opts.manifest = manifest;
            opts.skip_icon_bootstrap = skip_icon_bootstrap;
            opts.skip_dev_checks = skip_dev_checks;
            opts.skip_js_check = skip_js_check;
            opts.skip_ui_audit = skip_ui_audit;
            opts.skip_prepare = skip_prepare;
            opts.skip_audit = skip_audit;
            opts.skip_package = skip_package;
            opts.skip_assets = skip_assets;
            opts.skip_docs = skip_docs;
            opts.inputs = inputs;
            opts.icon_source = icon_source;
            opts.small_promo_source = small_promo_source;
            opts.marquee_source = marquee_source;
            opts.include_marquee = include_marquee;
            opts.allow_icon_fallback = allow_icon_fallback;
            opts.screenshot_size = screenshot_size;
            opts.max_screenshots = max_screenshots;
            opts.overwrite_screenshots = overwrite_screenshots;
            opts.capture_screenshots = capture_screenshots;
            opts.auto_capture = !no_auto_capture;
            opts.capture_cmd = capture_cmd;
            opts.capture_urls = urls;
            opts.min_popup_width = min_popup_width;
            opts.node_bin = node;
            opts.zip_out = zip_out;
            opts.permission_audit_out = permission_audit_out;
            opts.ui_audit_out = popup_audit_out;
            opts.listing_out = listing_out;
            opts.assets_root = assets_root;
            opts.summary_out = summary_out;
            commands::pipeline::run(&opts)
        }
        Commands::Assets {
            inputs,
            root,
            screenshot_size,
            max_screenshots,
            include_marquee,
            icon_source,
            small_promo_source,
            marquee_source,
            allow_icon_fallback,
            overwrite_screenshots,
        } => commands::assets::run(
            &inputs,
            &root,
            screenshot_size,
            max_screenshots,
            include_marquee,
            icon_source,
            small_promo_source,
            marquee_source,
            allow_icon_fallback,
            overwrite_screenshots,
        ),
        Commands::ValidateAssets { root, json } => commands::validate_assets::run(&root, json),
        Commands::Audit {
            root,
            manifest,
            out,
            max_evidence,
            fail_on_missing,
        } => commands::audit::run(&root, &manifest, &out, max_evidence, fail_on_missing),
        Commands::Package {
            root,
            manifest,
            out,
            extra,
            exclude,
            dry_run,
        } => commands::package::run(&root, &manifest, &out, &extra, &exclude, dry_run),
        Commands::Icons {
            root,
            manifest,
            dry_run,
        } => commands::icons::run(&root, &manifest, dry_run),
        Commands::UiAudit {
            root,
            manifest,
            out,
            min_popup_width,
        } => commands::ui_audit::run(&root, &manifest, &out, min_popup_width),
        Commands::Prepare { root, dry_run } => commands::prepare::run(&root, dry_run),
        Commands::Docs {
            root,
            manifest,
            out,
            features,
            single_purpose,
        } => commands::docs::run(&root, &manifest, &out, &features, single_purpose.as_deref()),
        Commands::Doctor { capture_cmd } => commands::doctor::run(&capture_cmd),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
