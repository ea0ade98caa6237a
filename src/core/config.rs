use super::baseline::CreditingRules;
use super::credits::OffsetMarket;
use super::extract::{FIRST_YEAR, LAST_YEAR};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("year range {first}-{last} must lie within 2001-2017")]
    InvalidYearRange { first: u16, last: u16 },
    #[error("{0} must not be empty")]
    EmptySchedule(&'static str),
    #[error("offset cap must be positive, got {0}")]
    NonPositiveOffsets(Decimal),
    #[error("flat density must be positive, got {0}")]
    NonPositiveDensity(Decimal),
    #[error("{0} exceeds the decimal range")]
    Overflow(&'static str),
}

/// How carbon mass is derived from hectares of avoided loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DensityPolicy {
    /// Per-country density from the carbon lookup table
    #[default]
    RegionSpecific,
    /// A single density applied to every region. The value is the raw, unscaled
    /// `co2 * price`; with co2 in MtCO2e that figure is millions of USD.
    Flat,
}

impl DensityPolicy {
    /// Divisor applied to `co2 * price` (prices are per tonne, volumes in millions of tonnes)
    pub fn value_divisor(&self) -> Decimal {
        match self {
            DensityPolicy::RegionSpecific => dec!(1000),
            DensityPolicy::Flat => Decimal::ONE,
        }
    }

    pub fn value_unit(&self) -> &'static str {
        match self {
            DensityPolicy::RegionSpecific => "billion USD",
            DensityPolicy::Flat => "million USD",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            DensityPolicy::RegionSpecific => "region-specific",
            DensityPolicy::Flat => "flat",
        }
    }
}

impl std::fmt::Display for DensityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// How a workbook's file name maps to a country code
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CountryCodeRule {
    /// Three characters before the extension, e.g. `gfw_2017_BRA.xlsx` -> `BRA`
    #[default]
    FileSuffix,
    /// Explicit file name -> country code map
    Explicit { files: BTreeMap<String, String> },
}

/// What to do when two workbooks resolve to the same country code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Later workbook replaces the earlier one (logged as a warning)
    #[default]
    Replace,
    /// Abort the run
    Reject,
}

/// Inclusive range of calendar years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct YearRange {
    pub first: u16,
    pub last: u16,
}

impl YearRange {
    pub const fn new(first: u16, last: u16) -> Self {
        YearRange { first, last }
    }

    pub fn years(&self) -> impl Iterator<Item = u16> {
        self.first..=self.last
    }

    pub fn len(&self) -> usize {
        self.years().count()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.first > self.last || self.first < FIRST_YEAR || self.last > LAST_YEAR {
            return Err(ConfigError::InvalidYearRange {
                first: self.first,
                last: self.last,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Run configuration. Every field has the reference default, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory searched for Global Forest Watch workbooks
    pub input_dir: PathBuf,
    /// Glob pattern for workbooks inside `input_dir`
    pub file_pattern: String,
    /// Country carbon density CSV (region-specific policy only)
    pub lookup_file: PathBuf,
    pub policy: DensityPolicy,
    /// Tonnes of carbon per hectare under the flat policy
    #[schemars(with = "f64")]
    pub flat_density: Decimal,
    pub country_codes: CountryCodeRule,
    pub on_duplicate_country: DuplicatePolicy,
    /// Years averaged into the reference rate
    pub reference_years: YearRange,
    /// Years summed into observed performance
    pub performance_years: YearRange,
    /// Annual baseline factors relative to the reference rate
    #[schemars(with = "Vec<f64>")]
    pub decline_schedule: Vec<Decimal>,
    /// Credit price in USD per tonne CO2e
    #[schemars(with = "f64")]
    pub price_per_tonne: Decimal,
    /// Annual allowance cap in MtCO2e
    #[schemars(with = "Vec<f64>")]
    pub cap_schedule: Vec<Decimal>,
    /// Share of the cap that may be met with offsets
    #[schemars(with = "f64")]
    pub offset_limit: Decimal,
    /// Share of the offset limit held back
    #[schemars(with = "f64")]
    pub offset_set_aside: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        let rules = CreditingRules::default();
        let market = OffsetMarket::default();
        Config {
            input_dir: PathBuf::from("gfw_data"),
            file_pattern: "*.xlsx".to_string(),
            lookup_file: PathBuf::from("other_data/carbon.csv"),
            policy: DensityPolicy::RegionSpecific,
            // 150 t C/ha as applied, not the 250 quoted alongside it
            flat_density: dec!(150),
            country_codes: CountryCodeRule::FileSuffix,
            on_duplicate_country: DuplicatePolicy::Replace,
            reference_years: rules.reference_years,
            performance_years: rules.performance_years,
            decline_schedule: rules.decline_schedule,
            price_per_tonne: market.price_per_tonne,
            cap_schedule: market.cap_schedule,
            offset_limit: market.offset_limit,
            offset_set_aside: market.offset_set_aside,
        }
    }
}

impl Config {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_json(BufReader::new(file))
    }

    pub fn read_json<R: Read>(reader: R) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reference_years.validate()?;
        self.performance_years.validate()?;
        if self.decline_schedule.is_empty() {
            return Err(ConfigError::EmptySchedule("decline_schedule"));
        }
        if self.cap_schedule.is_empty() {
            return Err(ConfigError::EmptySchedule("cap_schedule"));
        }
        if self.flat_density <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveDensity(self.flat_density));
        }
        if self.crediting_rules().decline_factor().is_none() {
            return Err(ConfigError::Overflow("decline_schedule"));
        }
        let offsets = self
            .market()
            .offsets()
            .ok_or(ConfigError::Overflow("offset cap"))?;
        if offsets <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveOffsets(offsets));
        }
        Ok(())
    }

    pub fn crediting_rules(&self) -> CreditingRules {
        CreditingRules {
            reference_years: self.reference_years,
            performance_years: self.performance_years,
            decline_schedule: self.decline_schedule.clone(),
        }
    }

    pub fn market(&self) -> OffsetMarket {
        OffsetMarket {
            price_per_tonne: self.price_per_tonne,
            cap_schedule: self.cap_schedule.clone(),
            offset_limit: self.offset_limit,
            offset_set_aside: self.offset_set_aside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::read_json("{}".as_bytes()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_config_overrides_fields() {
        let json = r#"{
            "policy": "flat",
            "flat_density": 250,
            "country_codes": { "rule": "explicit", "files": { "brazil.xlsx": "BRA" } }
        }"#;
        let config = Config::read_json(json.as_bytes()).unwrap();
        assert_eq!(config.policy, DensityPolicy::Flat);
        assert_eq!(config.flat_density, dec!(250));
        assert_eq!(
            config.country_codes,
            CountryCodeRule::Explicit {
                files: BTreeMap::from([("brazil.xlsx".to_string(), "BRA".to_string())])
            }
        );
        assert_eq!(config.price_per_tonne, dec!(14.61));
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = Config::read_json(r#"{ "price": 10 }"#.as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn year_range_outside_export_rejected() {
        let json = r#"{ "performance_years": { "first": 2011, "last": 2019 } }"#;
        let err = Config::read_json(json.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidYearRange {
                first: 2011,
                last: 2019
            }
        ));
    }

    #[test]
    fn empty_cap_rejected() {
        let err = Config::read_json(r#"{ "cap_schedule": [] }"#.as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySchedule("cap_schedule")));
    }

    #[test]
    fn full_set_aside_rejected() {
        let err = Config::read_json(r#"{ "offset_set_aside": 1 }"#.as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveOffsets(_)));
    }

    #[test]
    fn overflowing_cap_rejected() {
        let config = Config {
            cap_schedule: vec![
                dec!(50000000000000000000000000000),
                dec!(50000000000000000000000000000),
            ],
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Overflow("offset cap")));
    }

    #[test]
    fn year_range_len() {
        assert_eq!(YearRange::new(2001, 2010).len(), 10);
        assert_eq!(YearRange::new(2011, 2017).len(), 7);
        assert_eq!(YearRange::new(2011, 2017).to_string(), "2011-2017");
    }

    #[test]
    fn value_scale_follows_policy() {
        assert_eq!(DensityPolicy::RegionSpecific.value_divisor(), dec!(1000));
        assert_eq!(DensityPolicy::RegionSpecific.value_unit(), "billion USD");
        assert_eq!(DensityPolicy::Flat.value_divisor(), Decimal::ONE);
        assert_eq!(DensityPolicy::Flat.value_unit(), "million USD");
    }
}
