use super::config::{CountryCodeRule, DuplicatePolicy};
use super::extract::LossRow;
use super::warnings::Warning;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("cannot derive a country code from file name '{0}'")]
    InvalidFileName(String),
    #[error("no country code configured for file '{0}'")]
    UnmappedFile(String),
    #[error(
        "country code {code} from {} already loaded from {}",
        .file.display(),
        .existing.display()
    )]
    DuplicateCountry {
        code: String,
        file: PathBuf,
        existing: PathBuf,
    },
}

/// Resolve the country code for a workbook path
pub fn country_code(rule: &CountryCodeRule, path: &Path) -> Result<String, AggregateError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match rule {
        CountryCodeRule::FileSuffix => {
            suffix_code(&file_name).ok_or(AggregateError::InvalidFileName(file_name))
        }
        CountryCodeRule::Explicit { files } => files
            .get(&file_name)
            .cloned()
            .ok_or(AggregateError::UnmappedFile(file_name)),
    }
}

/// The three characters immediately before the extension
fn suffix_code(file_name: &str) -> Option<String> {
    let stem = match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    };
    let chars: Vec<char> = stem.chars().collect();
    if chars.len() < 3 {
        return None;
    }
    Some(chars[chars.len() - 3..].iter().collect())
}

/// Loss rows from a single workbook
#[derive(Debug, Clone)]
pub struct CountryTable {
    pub code: String,
    pub source: PathBuf,
    pub rows: Vec<LossRow>,
}

/// All extracted regions keyed by (country code, region)
#[derive(Debug, Default)]
pub struct LossTable {
    countries: BTreeMap<String, CountryTable>,
}

impl LossTable {
    /// Add a country. A repeated code either replaces the earlier table
    /// (returning a warning) or fails, depending on `on_duplicate`.
    pub fn insert(
        &mut self,
        table: CountryTable,
        on_duplicate: DuplicatePolicy,
    ) -> Result<Option<Warning>, AggregateError> {
        let warning = match self.countries.get(&table.code) {
            None => None,
            Some(existing) => match on_duplicate {
                DuplicatePolicy::Reject => {
                    return Err(AggregateError::DuplicateCountry {
                        code: table.code.clone(),
                        file: table.source.clone(),
                        existing: existing.source.clone(),
                    })
                }
                DuplicatePolicy::Replace => Some(Warning::DuplicateCountry {
                    code: table.code.clone(),
                    kept: table.source.clone(),
                    replaced: existing.source.clone(),
                }),
            },
        };
        self.countries.insert(table.code.clone(), table);
        Ok(warning)
    }

    pub fn countries(&self) -> impl Iterator<Item = &CountryTable> {
        self.countries.values()
    }

    pub fn regions(&self) -> impl Iterator<Item = (&str, &LossRow)> {
        self.countries
            .values()
            .flat_map(|c| c.rows.iter().map(move |row| (c.code.as_str(), row)))
    }

    pub fn region_count(&self) -> usize {
        self.countries.values().map(|c| c.rows.len()).sum()
    }
}
