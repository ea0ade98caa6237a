//! Regions command - per-region baseline, performance and credits

use super::SourceArgs;
use crate::core::{pipeline, RegionCredit};
use crate::utils::{format_optional, write_csv, CsvField};
use clap::Args;
use ctfs_derive::CsvSchema;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct RegionsCommand {
    #[command(flatten)]
    source: SourceArgs,

    /// Only show regions of this country code (e.g. BRA)
    #[arg(long)]
    country: Option<String>,

    /// Only show regions that count toward the totals
    #[arg(long)]
    credited: bool,

    /// Output as CSV instead of formatted table
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Output as JSON instead of formatted table
    #[arg(long)]
    json: bool,
}

/// One row of `regions --csv`
#[derive(Debug, Clone, Serialize, CsvSchema)]
pub struct RegionRecord {
    /// Country code derived from the workbook file name
    pub country: String,
    /// Subnational region name
    pub region: String,
    /// Mean annual loss over the reference years (ha)
    pub reference: Option<Decimal>,
    /// Reference times the summed decline schedule (ha)
    pub baseline: Option<Decimal>,
    /// Total loss over the performance years (ha)
    pub performance: Decimal,
    /// Baseline minus performance (ha)
    pub credits_ha: Option<Decimal>,
    /// Credits in tonnes of carbon
    pub credits_c: Option<Decimal>,
    /// Whether the region counts toward the totals
    pub credited: bool,
}

impl From<&RegionCredit> for RegionRecord {
    fn from(credit: &RegionCredit) -> Self {
        let a = &credit.assessment;
        RegionRecord {
            country: a.country.clone(),
            region: a.region.clone(),
            reference: a.reference,
            baseline: a.baseline,
            performance: a.performance,
            credits_ha: a.credits_ha,
            credits_c: credit.credits_c,
            credited: credit.credited,
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct RegionRow {
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Reference (ha)")]
    reference: String,
    #[tabled(rename = "Baseline (ha)")]
    baseline: String,
    #[tabled(rename = "Performance (ha)")]
    performance: String,
    #[tabled(rename = "Credits (ha)")]
    credits_ha: String,
    #[tabled(rename = "Credits (tC)")]
    credits_c: String,
    #[tabled(rename = "Credited")]
    credited: String,
}

impl RegionsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let config = self.source.config()?;
        let estimate = pipeline::run(&config)?;

        let records: Vec<RegionRecord> = estimate
            .credits
            .iter()
            .filter(|c| {
                self.country
                    .as_deref()
                    .map_or(true, |code| c.assessment.country.eq_ignore_ascii_case(code))
            })
            .filter(|c| !self.credited || c.credited)
            .map(RegionRecord::from)
            .collect();

        if self.csv {
            write_csv(&records, io::stdout())
        } else if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        } else {
            self.print_table(&records);
            Ok(())
        }
    }

    fn print_table(&self, records: &[RegionRecord]) {
        if records.is_empty() {
            println!("No regions found matching filters");
            return;
        }

        let rows: Vec<RegionRow> = records
            .iter()
            .map(|r| RegionRow {
                country: r.country.clone(),
                region: r.region.clone(),
                reference: format_optional(r.reference),
                baseline: format_optional(r.baseline),
                performance: format_optional(Some(r.performance)),
                credits_ha: format_optional(r.credits_ha),
                credits_c: format_optional(r.credits_c),
                credited: if r.credited { "yes" } else { "no" }.to_string(),
            })
            .collect();

        println!();
        let credited = records.iter().filter(|r| r.credited).count();
        println!("REGIONS ({} credited of {})", credited, records.len());
        println!();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..7)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
    }
}
