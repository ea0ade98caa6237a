use serde::Serialize;
use std::path::PathBuf;

/// Data quality warnings raised while loading and crediting regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Two workbooks resolved to the same country code; `kept` replaced `replaced`.
    DuplicateCountry {
        code: String,
        kept: PathBuf,
        replaced: PathBuf,
    },
    /// Country has no carbon density, so its regions are left out of the totals.
    MissingDensity { code: String, regions: usize },
    /// Every reference year is blank, so the region can never be credited.
    UndefinedReference { code: String, region: String },
    /// Decline schedule and performance window cover a different number of years.
    ScheduleLengthMismatch {
        schedule: usize,
        performance_years: usize,
    },
}

impl Warning {
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::DuplicateCountry { .. } => "DuplicateCountry",
            Warning::MissingDensity { .. } => "MissingDensity",
            Warning::UndefinedReference { .. } => "UndefinedReference",
            Warning::ScheduleLengthMismatch { .. } => "ScheduleLengthMismatch",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::DuplicateCountry {
                code,
                kept,
                replaced,
            } => write!(
                f,
                "country code {} from {} replaces {}",
                code,
                kept.display(),
                replaced.display()
            ),
            Warning::MissingDensity { code, regions } => write!(
                f,
                "no carbon density for {}, {} region(s) excluded from totals",
                code, regions
            ),
            Warning::UndefinedReference { code, region } => {
                write!(f, "{} / {} has no reference year data", code, region)
            }
            Warning::ScheduleLengthMismatch {
                schedule,
                performance_years,
            } => write!(
                f,
                "decline schedule has {} years but performance window has {}",
                schedule, performance_years
            ),
        }
    }
}
