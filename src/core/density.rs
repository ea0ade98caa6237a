use crate::utils::CsvField;
use ctfs_derive::CsvSchema;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

pub const DENSITY_COLUMN: &str = "carbon";

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("failed to read carbon lookup: {0}")]
    Csv(#[from] csv::Error),
    #[error("carbon lookup has no '{0}' column")]
    MissingColumn(&'static str),
    #[error("invalid carbon density '{value}' for {code}")]
    InvalidDensity { code: String, value: String },
}

/// One row of the country carbon density lookup
#[derive(Debug, Clone, PartialEq, Serialize, CsvSchema)]
pub struct CarbonDensityRecord {
    /// Country code, always the first column (header name is ignored)
    pub country: String,
    /// Tonnes of carbon per hectare; blank leaves the country without a density
    pub carbon: Option<Decimal>,
}

/// Country code -> tonnes of carbon per hectare
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarbonDensities(BTreeMap<String, Decimal>);

impl CarbonDensities {
    /// Read the lookup CSV. The first column is the key, like an index
    /// column; densities come from the `carbon` column.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, LookupError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let column = rdr
            .headers()?
            .iter()
            .position(|h| h.trim() == DENSITY_COLUMN)
            .ok_or(LookupError::MissingColumn(DENSITY_COLUMN))?;

        let mut densities = BTreeMap::new();
        for record in rdr.records() {
            let record = record?;
            let record = parse_record(&record, column)?;
            match record.carbon {
                Some(carbon) => {
                    if densities.insert(record.country.clone(), carbon).is_some() {
                        log::warn!(
                            "carbon lookup lists {} more than once, using the last entry",
                            record.country
                        );
                    }
                }
                None => log::debug!("carbon lookup has a blank density for {}", record.country),
            }
        }
        log::info!("Read {} carbon densities", densities.len());
        Ok(CarbonDensities(densities))
    }

    pub fn get(&self, code: &str) -> Option<Decimal> {
        self.0.get(code).copied()
    }

    /// Countries with a usable density
    pub fn country_count(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, Decimal)> for CarbonDensities {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        CarbonDensities(iter.into_iter().collect())
    }
}

fn parse_record(
    record: &csv::StringRecord,
    column: usize,
) -> Result<CarbonDensityRecord, LookupError> {
    let country = record.get(0).unwrap_or_default().trim().to_string();
    let value = record.get(column).unwrap_or_default().trim();
    let carbon = if value.is_empty() {
        None
    } else {
        let density = Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .map_err(|_| LookupError::InvalidDensity {
                code: country.clone(),
                value: value.to_string(),
            })?;
        Some(density)
    };
    Ok(CarbonDensityRecord { country, carbon })
}
