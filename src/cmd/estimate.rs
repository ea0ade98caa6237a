//! Estimate command - total non-additional credits, value and cap share

use super::SourceArgs;
use crate::core::{pipeline, CreditSummary, Estimate, Warning};
use crate::utils::format_2dp;
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug, Default)]
pub struct EstimateCommand {
    #[command(flatten)]
    source: SourceArgs,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct EstimateOutput<'a> {
    input_fingerprint: &'a str,
    files: Vec<String>,
    summary: &'a CreditSummary,
    warnings: &'a [Warning],
}

impl EstimateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = self.source.config()?;
        let estimate = pipeline::run(&config)?;

        if self.json {
            self.print_json(&estimate)
        } else {
            for line in summary_lines(&estimate.summary) {
                println!("{}", line);
            }
            Ok(())
        }
    }

    fn print_json(&self, estimate: &Estimate) -> anyhow::Result<()> {
        let output = EstimateOutput {
            input_fingerprint: &estimate.fingerprint,
            files: estimate
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            summary: &estimate.summary,
            warnings: &estimate.warnings,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

/// The three result lines, values rounded to 2 places
pub fn summary_lines(summary: &CreditSummary) -> [String; 3] {
    [
        format!(
            "Total non-additional credits (MMtCO2e): {}",
            format_2dp(summary.co2_credited)
        ),
        format!(
            "Total value of credits ({}): {}",
            summary.value_unit,
            format_2dp(summary.credit_value)
        ),
        format!(
            "Annual non-additional allowances as share of offset cap: {}",
            format_2dp(summary.redd_share)
        ),
    ]
}
