use super::config::YearRange;
use super::extract::LossRow;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Rules for turning historical loss into a crediting baseline
#[derive(Debug, Clone, PartialEq)]
pub struct CreditingRules {
    pub reference_years: YearRange,
    pub performance_years: YearRange,
    pub decline_schedule: Vec<Decimal>,
}

impl Default for CreditingRules {
    /// 2001-2010 reference, 2011-2017 performance, baseline starting 10%
    /// below reference and dropping 3 points a year (on a 30 year glide to zero)
    fn default() -> Self {
        CreditingRules {
            reference_years: YearRange::new(2001, 2010),
            performance_years: YearRange::new(2011, 2017),
            decline_schedule: vec![
                dec!(0.90),
                dec!(0.87),
                dec!(0.84),
                dec!(0.81),
                dec!(0.78),
                dec!(0.75),
                dec!(0.72),
            ],
        }
    }
}

/// A quantity that no longer fits in a `Decimal`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{quantity} for {scope} exceeds the decimal range")]
pub struct Overflow {
    pub quantity: &'static str,
    pub scope: String,
}

impl Overflow {
    pub fn new(quantity: &'static str, scope: impl Into<String>) -> Self {
        Overflow {
            quantity,
            scope: scope.into(),
        }
    }
}

/// Sum that returns `None` instead of panicking when the total overflows
pub fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
}

impl CreditingRules {
    /// Sum of the decline schedule, i.e. baseline years expressed in reference years.
    /// `None` on overflow.
    pub fn decline_factor(&self) -> Option<Decimal> {
        checked_sum(self.decline_schedule.iter().copied())
    }

    /// Mean annual loss over the reference years, ignoring blank years.
    /// `Ok(None)` when every reference year is blank.
    pub fn reference(&self, row: &LossRow) -> Result<Option<Decimal>, Overflow> {
        let values: Vec<Decimal> = self
            .reference_years
            .years()
            .filter_map(|year| row.loss(year))
            .collect();
        if values.is_empty() {
            return Ok(None);
        }
        let total = checked_sum(values.iter().copied())
            .ok_or_else(|| Overflow::new("reference loss", &row.region))?;
        Ok(Some(total / Decimal::from(values.len())))
    }

    /// `None` on overflow
    pub fn baseline(&self, reference: Decimal) -> Option<Decimal> {
        self.decline_factor()?.checked_mul(reference)
    }

    /// Total loss over the performance years; blank years count as zero
    pub fn performance(&self, row: &LossRow) -> Result<Decimal, Overflow> {
        checked_sum(self.performance_years.years().filter_map(|year| row.loss(year)))
            .ok_or_else(|| Overflow::new("performance loss", &row.region))
    }

    pub fn assess(&self, country: &str, row: &LossRow) -> Result<RegionAssessment, Overflow> {
        let reference = self.reference(row)?;
        let baseline = reference
            .map(|r| {
                self.baseline(r)
                    .ok_or_else(|| Overflow::new("baseline", &row.region))
            })
            .transpose()?;
        let performance = self.performance(row)?;
        let credits_ha = baseline
            .map(|b| {
                b.checked_sub(performance)
                    .ok_or_else(|| Overflow::new("credits", &row.region))
            })
            .transpose()?;
        log::debug!(
            "{} / {}: reference={:?} baseline={:?} performance={} credits_ha={:?}",
            country,
            row.region,
            reference,
            baseline,
            performance,
            credits_ha
        );
        Ok(RegionAssessment {
            country: country.to_string(),
            region: row.region.clone(),
            reference,
            baseline,
            performance,
            credits_ha,
        })
    }
}

/// Baseline versus observed loss for one region, in hectares
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionAssessment {
    pub country: String,
    pub region: String,
    pub reference: Option<Decimal>,
    pub baseline: Option<Decimal>,
    pub performance: Decimal,
    /// Baseline minus performance; positive means loss stayed under the baseline
    pub credits_ha: Option<Decimal>,
}
