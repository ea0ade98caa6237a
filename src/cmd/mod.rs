pub mod estimate;
pub mod regions;
pub mod schema;
pub mod validate;

use crate::core::{Config, DensityPolicy};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Input and policy flags shared by every pipeline command
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing Global Forest Watch workbooks
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Glob pattern for workbooks within the input directory
    #[arg(long)]
    pattern: Option<String>,

    /// Carbon density CSV (region-specific policy)
    #[arg(short, long)]
    lookup: Option<PathBuf>,

    /// Carbon density policy
    #[arg(short, long, value_enum)]
    policy: Option<PolicyArg>,

    /// Tonnes of carbon per hectare for the flat policy
    #[arg(long)]
    flat_density: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Per-country density from the lookup CSV
    RegionSpecific,
    /// One density for every region; value in million USD (unscaled co2 * price)
    Flat,
}

impl From<PolicyArg> for DensityPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::RegionSpecific => DensityPolicy::RegionSpecific,
            PolicyArg::Flat => DensityPolicy::Flat,
        }
    }
}

impl SourceArgs {
    /// Config file (or defaults) with command-line overrides applied
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.file_pattern = pattern.clone();
        }
        if let Some(lookup) = &self.lookup {
            config.lookup_file = lookup.clone();
        }
        if let Some(policy) = self.policy {
            config.policy = policy.into();
        }
        if let Some(density) = self.flat_density {
            config.flat_density = density;
        }
        config.validate()?;
        log::debug!("Config: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flags_override_defaults() {
        let args = SourceArgs {
            input_dir: Some(PathBuf::from("data")),
            policy: Some(PolicyArg::Flat),
            flat_density: Some(dec!(250)),
            ..SourceArgs::default()
        };
        let config = args.config().unwrap();
        assert_eq!(config.input_dir, PathBuf::from("data"));
        assert_eq!(config.policy, DensityPolicy::Flat);
        assert_eq!(config.flat_density, dec!(250));
        assert_eq!(config.lookup_file, Config::default().lookup_file);
    }

    #[test]
    fn invalid_override_rejected() {
        let args = SourceArgs {
            flat_density: Some(dec!(-1)),
            ..SourceArgs::default()
        };
        assert!(args.config().is_err());
    }
}
