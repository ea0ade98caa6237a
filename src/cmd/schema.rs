//! Schema command - print expected input and output formats

use super::regions::RegionRecord;
use crate::core::extract::{FIRST_YEAR, LAST_YEAR, LOSS_LABEL, SHEET_NAME};
use crate::core::{CarbonDensityRecord, Config};
use crate::utils::CsvField;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// What to describe
    #[arg(value_enum, default_value = "config")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the config file
    Config,
    /// Default config as JSON
    DefaultConfig,
    /// Expected layout of the loss workbooks
    Workbook,
    /// Carbon density lookup CSV columns
    Lookup,
    /// Columns written by `regions --csv`
    Regions,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::Config => {
                let schema = schema_for!(Config);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            SchemaFormat::DefaultConfig => {
                println!("{}", serde_json::to_string_pretty(&Config::default())?);
            }
            SchemaFormat::Workbook => print_workbook(),
            SchemaFormat::Lookup => {
                print_fields("Carbon Lookup CSV Format", CarbonDensityRecord::csv_schema())
            }
            SchemaFormat::Regions => print_fields("Regions CSV Format", RegionRecord::csv_schema()),
        }
        Ok(())
    }
}

fn print_workbook() {
    println!("Loss Workbook Format");
    println!("====================");
    println!();
    println!("Sheet:       {}", SHEET_NAME);
    println!("Row 1:       a cell labelled \"{}\"", LOSS_LABEL);
    println!("             marks the first of {} year columns", LAST_YEAR - FIRST_YEAR + 1);
    println!("Row 2:       years {}..{} under those columns", FIRST_YEAR, LAST_YEAR);
    println!("Row 3+:      region name in column A, hectares lost per year");
    println!();
    println!("Country code: last three characters of the file name before the extension,");
    println!("              or an explicit file map in the config (country_codes)");
}

fn print_fields(title: &str, fields: &[CsvField]) {
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!();
    for field in fields {
        let req = if field.required { "required" } else { "optional" };
        println!("{:12} ({:8})  {}", field.name, req, field.description);
    }
}
