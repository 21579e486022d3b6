//! Standalone asset validation command.
//!
//! Checks whatever exists under the store-assets root against the published
//! contract. Usable before or after manual edits; never writes anything.

use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use storeforge_assets::validate_tree;

pub fn run(root: &str, json: bool) -> Result<ExitCode> {
    let report = validate_tree(Path::new(root));

    if json {
        println!("{}", report.to_json_pretty()?);
        return Ok(if report.ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    if report.ok {
        println!("{} store asset validation passed: {}", "ok".green(), root);
    } else {
        println!("{} store asset validation failed: {}", "FAIL".red(), root);
    }
    for note in &report.notes {
        println!("{} {}", "note:".yellow(), note);
    }
    for check in &report.checks {
        if check.passed {
            println!("  {} {}: {}", "ok".green(), check.label, check.message);
        } else {
            println!("  {} {}: {}", "!!".red(), check.label, check.message);
        }
    }

    Ok(if report.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
