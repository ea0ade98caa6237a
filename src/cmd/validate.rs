//! Validate command - surface data quality issues without printing totals

use super::SourceArgs;
use crate::core::{pipeline, Warning};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    source: SourceArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    // serialized through `detail`'s tag
    #[serde(skip)]
    issue_type: &'static str,
    message: String,
    #[serde(flatten)]
    detail: Warning,
}

#[derive(Debug, Serialize)]
struct ValidationOutput {
    files: usize,
    regions: usize,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = self.source.config()?;
        let estimate = pipeline::run(&config)?;

        let issues: Vec<ValidationIssue> = estimate
            .warnings
            .iter()
            .map(|w| ValidationIssue {
                issue_type: w.kind(),
                message: w.to_string(),
                detail: w.clone(),
            })
            .collect();

        let output = ValidationOutput {
            files: estimate.files.len(),
            regions: estimate.credits.len(),
            issue_count: issues.len(),
            issues,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&output);
        }

        // Exit with code 1 if issues found
        if output.issue_count > 0 {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(output: &ValidationOutput) {
    println!();
    println!(
        "VALIDATION RESULTS ({} workbooks, {} regions)",
        output.files, output.regions
    );
    println!();

    if output.issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", output.issue_count);
    println!();
    for (i, issue) in output.issues.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, issue.issue_type, issue.message);
    }
    println!();
}
