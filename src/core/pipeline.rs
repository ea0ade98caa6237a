//! End-to-end estimate: discover workbooks, extract and aggregate losses,
//! assess each region against its baseline, then credit and summarize.

use super::aggregate::{country_code, CountryTable, LossTable};
use super::config::{Config, DensityPolicy};
use super::credits::{convert, summarize, CarbonConversion, CreditSummary, RegionCredit};
use super::density::CarbonDensities;
use super::extract::read_workbook;
use super::warnings::Warning;
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Everything produced by one run
#[derive(Debug, Clone)]
pub struct Estimate {
    pub files: Vec<PathBuf>,
    pub credits: Vec<RegionCredit>,
    pub summary: CreditSummary,
    pub warnings: Vec<Warning>,
    /// SHA-256 over every input file, in read order
    pub fingerprint: String,
}

/// Workbooks in `dir` matching `pattern`, sorted by path
pub fn discover_workbooks(dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("input directory {} does not exist", dir.display());
    }
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let mut files = glob::glob(&full)
        .with_context(|| format!("invalid file pattern '{}'", pattern))?
        .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| path.is_file());
    files.sort();
    if files.is_empty() {
        anyhow::bail!("no workbooks matching '{}' in {}", pattern, dir.display());
    }
    log::info!("Found {} workbooks in {}", files.len(), dir.display());
    Ok(files)
}

/// Extract every workbook and key its regions by country code
pub fn load_losses(
    config: &Config,
    files: &[PathBuf],
) -> anyhow::Result<(LossTable, Vec<Warning>)> {
    let mut losses = LossTable::default();
    let mut warnings = Vec::new();
    for path in files {
        let code = country_code(&config.country_codes, path)?;
        let rows = read_workbook(path).with_context(|| format!("reading {}", path.display()))?;
        log::info!("{}: {} regions from {}", code, rows.len(), path.display());
        let table = CountryTable {
            code,
            source: path.clone(),
            rows,
        };
        if let Some(warning) = losses.insert(table, config.on_duplicate_country)? {
            log::warn!("{}", warning);
            warnings.push(warning);
        }
    }
    log::info!(
        "Loaded {} regions across {} countries",
        losses.region_count(),
        losses.countries().count()
    );
    Ok((losses, warnings))
}

pub fn load_conversion(config: &Config) -> anyhow::Result<CarbonConversion> {
    match config.policy {
        DensityPolicy::RegionSpecific => {
            let file = File::open(&config.lookup_file)
                .with_context(|| format!("opening {}", config.lookup_file.display()))?;
            let densities = CarbonDensities::read_csv(file)
                .with_context(|| format!("reading {}", config.lookup_file.display()))?;
            log::debug!(
                "{} countries have a carbon density in {}",
                densities.country_count(),
                config.lookup_file.display()
            );
            Ok(CarbonConversion::Lookup(densities))
        }
        DensityPolicy::Flat => Ok(CarbonConversion::Flat(config.flat_density)),
    }
}

/// Assess, convert and summarize an already loaded table
pub fn estimate(
    config: &Config,
    losses: &LossTable,
    conversion: &CarbonConversion,
) -> anyhow::Result<(Vec<RegionCredit>, CreditSummary, Vec<Warning>)> {
    let rules = config.crediting_rules();
    let mut warnings = Vec::new();

    if rules.decline_schedule.len() != rules.performance_years.len() {
        warnings.push(Warning::ScheduleLengthMismatch {
            schedule: rules.decline_schedule.len(),
            performance_years: rules.performance_years.len(),
        });
    }

    let assessments = losses
        .regions()
        .map(|(code, row)| {
            rules
                .assess(code, row)
                .with_context(|| format!("assessing {} / {}", code, row.region))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    for assessment in assessments.iter().filter(|a| a.reference.is_none()) {
        warnings.push(Warning::UndefinedReference {
            code: assessment.country.clone(),
            region: assessment.region.clone(),
        });
    }

    let mut unmatched: BTreeMap<&str, usize> = BTreeMap::new();
    for country in losses.countries() {
        if conversion.density(&country.code).is_none() {
            *unmatched.entry(country.code.as_str()).or_default() += country.rows.len();
        }
    }
    warnings.extend(unmatched.into_iter().map(|(code, regions)| Warning::MissingDensity {
        code: code.to_string(),
        regions,
    }));

    for warning in &warnings {
        log::warn!("{}", warning);
    }

    let credits = convert(assessments, conversion)?;
    let summary = summarize(&credits, conversion.policy(), &config.market())?;
    Ok((credits, summary, warnings))
}

pub fn run(config: &Config) -> anyhow::Result<Estimate> {
    config.validate()?;
    let files = discover_workbooks(&config.input_dir, &config.file_pattern)?;
    let (losses, mut warnings) = load_losses(config, &files)?;
    let conversion = load_conversion(config)?;
    let (credits, summary, estimate_warnings) = estimate(config, &losses, &conversion)?;
    warnings.extend(estimate_warnings);

    let mut inputs = files.clone();
    if config.policy == DensityPolicy::RegionSpecific {
        inputs.push(config.lookup_file.clone());
    }
    let fingerprint = fingerprint(&inputs)?;

    Ok(Estimate {
        files,
        credits,
        summary,
        warnings,
        fingerprint,
    })
}

/// SHA-256 over each file's name and contents
pub fn fingerprint(paths: &[PathBuf]) -> anyhow::Result<String> {
    let mut hasher = Sha256::new();
    for path in paths {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        hasher.update(name.as_bytes());
        let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        std::io::copy(&mut file, &mut hasher)?;
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::{LossRow, YEAR_COUNT};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn row(region: &str, reference: Decimal, performance: Decimal) -> LossRow {
        let mut losses = [Some(reference); YEAR_COUNT];
        for loss in losses.iter_mut().skip(10) {
            *loss = Some(performance);
        }
        LossRow {
            region: region.to_string(),
            losses,
        }
    }

    fn table(code: &str, rows: Vec<LossRow>) -> CountryTable {
        CountryTable {
            code: code.to_string(),
            source: PathBuf::from(format!("gfw_{}.xlsx", code)),
            rows,
        }
    }

    fn two_countries() -> LossTable {
        let mut losses = LossTable::default();
        losses
            .insert(
                table("AAA", vec![row("a1", dec!(10000), dec!(0))]),
                Default::default(),
            )
            .unwrap();
        losses
            .insert(
                table("BBB", vec![row("b1", dec!(1), dec!(10))]),
                Default::default(),
            )
            .unwrap();
        losses
    }

    #[test]
    fn only_credited_country_counts() {
        let config = Config::default();
        let conversion = CarbonConversion::Lookup(
            [("AAA".to_string(), dec!(100)), ("BBB".to_string(), dec!(100))]
                .into_iter()
                .collect(),
        );
        let (credits, summary, warnings) =
            estimate(&config, &two_countries(), &conversion).unwrap();

        assert_eq!(credits.len(), 2);
        assert!(credits[0].credited);
        assert!(!credits[1].credited);
        assert_eq!(credits[1].assessment.credits_ha, Some(dec!(5.67) - dec!(70)));
        assert_eq!(summary.regions_credited, 1);
        // 56700 ha * 100 t/ha
        assert_eq!(summary.c_credited, dec!(5.67));
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_density_reported_per_country() {
        let config = Config::default();
        let conversion =
            CarbonConversion::Lookup([("AAA".to_string(), dec!(100))].into_iter().collect());
        let (_, summary, warnings) = estimate(&config, &two_countries(), &conversion).unwrap();
        assert_eq!(
            warnings,
            vec![Warning::MissingDensity {
                code: "BBB".to_string(),
                regions: 1
            }]
        );
        assert_eq!(summary.regions_credited, 1);
    }

    #[test]
    fn flat_policy_needs_no_lookup() {
        let config = Config {
            policy: DensityPolicy::Flat,
            ..Config::default()
        };
        let conversion = load_conversion(&config).unwrap();
        assert_eq!(conversion, CarbonConversion::Flat(dec!(150)));
    }

    #[test]
    fn schedule_mismatch_warned() {
        let config = Config {
            decline_schedule: vec![dec!(0.9)],
            ..Config::default()
        };
        let (_, _, warnings) =
            estimate(&config, &two_countries(), &CarbonConversion::Flat(dec!(1))).unwrap();
        assert_eq!(
            warnings,
            vec![Warning::ScheduleLengthMismatch {
                schedule: 1,
                performance_years: 7
            }]
        );
    }

    #[test]
    fn undefined_reference_warned() {
        let mut losses = LossTable::default();
        let mut blank = row("blank", dec!(0), dec!(1));
        for loss in blank.losses.iter_mut().take(10) {
            *loss = None;
        }
        losses.insert(table("AAA", vec![blank]), Default::default()).unwrap();
        let (credits, _, warnings) =
            estimate(&Config::default(), &losses, &CarbonConversion::Flat(dec!(150))).unwrap();
        assert!(!credits[0].credited);
        assert_eq!(
            warnings,
            vec![Warning::UndefinedReference {
                code: "AAA".to_string(),
                region: "blank".to_string()
            }]
        );
    }

    #[test]
    fn oversized_losses_are_an_error() {
        let mut losses = LossTable::default();
        let huge = row("Acre", dec!(20000000000000000000000000000), dec!(0));
        losses.insert(table("AAA", vec![huge]), Default::default()).unwrap();
        let err = estimate(&Config::default(), &losses, &CarbonConversion::Flat(dec!(150)))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("assessing AAA / Acre"));
    }

    #[test]
    fn discover_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_BBB.xlsx", "a_AAA.xlsx", "notes.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        let files = discover_workbooks(dir.path(), "*.xlsx").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_AAA.xlsx", "b_BBB.xlsx"]);
    }

    #[test]
    fn discover_requires_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_workbooks(dir.path(), "*.xlsx").is_err());
        assert!(discover_workbooks(&dir.path().join("missing"), "*.xlsx").is_err());
    }

    #[test]
    fn fingerprint_tracks_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carbon.csv");
        File::create(&path).unwrap().write_all(b"country,carbon\n").unwrap();
        let first = fingerprint(&[path.clone()]).unwrap();
        assert_eq!(first, fingerprint(&[path.clone()]).unwrap());
        assert_eq!(first.len(), 64);

        File::create(&path).unwrap().write_all(b"country,carbon\nBRA,1\n").unwrap();
        assert_ne!(first, fingerprint(&[path]).unwrap());
    }
}
