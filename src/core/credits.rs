use super::baseline::{checked_sum, Overflow, RegionAssessment};
use super::config::DensityPolicy;
use super::density::CarbonDensities;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Tonnes per million tonnes
const MEGATONNE: Decimal = dec!(1000000);

/// Mass of CO2 per unit mass of carbon (44/12); `None` on overflow
pub fn co2_from_carbon(carbon: Decimal) -> Option<Decimal> {
    carbon.checked_mul(dec!(44)).map(|c| c / dec!(12))
}

/// Source of carbon density for converting hectares to tonnes of carbon
#[derive(Debug, Clone, PartialEq)]
pub enum CarbonConversion {
    Lookup(CarbonDensities),
    Flat(Decimal),
}

impl CarbonConversion {
    pub fn policy(&self) -> DensityPolicy {
        match self {
            CarbonConversion::Lookup(_) => DensityPolicy::RegionSpecific,
            CarbonConversion::Flat(_) => DensityPolicy::Flat,
        }
    }

    pub fn density(&self, country: &str) -> Option<Decimal> {
        match self {
            CarbonConversion::Lookup(densities) => densities.get(country),
            CarbonConversion::Flat(density) => Some(*density),
        }
    }
}

/// Compliance market the credits would be sold into
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetMarket {
    /// USD per tonne CO2e
    pub price_per_tonne: Decimal,
    /// Annual cap, MtCO2e
    pub cap_schedule: Vec<Decimal>,
    pub offset_limit: Decimal,
    pub offset_set_aside: Decimal,
}

impl Default for OffsetMarket {
    fn default() -> Self {
        OffsetMarket {
            price_per_tonne: dec!(14.61),
            cap_schedule: vec![
                dec!(321),
                dec!(308),
                dec!(294),
                dec!(281),
                dec!(267),
                dec!(254),
                dec!(240),
            ],
            offset_limit: dec!(0.08),
            offset_set_aside: dec!(0.08),
        }
    }
}

impl OffsetMarket {
    /// Offsets usable under the cap, net of the set-aside (MtCO2e); `None` on overflow
    pub fn offsets(&self) -> Option<Decimal> {
        let cap = checked_sum(self.cap_schedule.iter().copied())?;
        let retained = Decimal::ONE.checked_sub(self.offset_set_aside)?;
        cap.checked_mul(self.offset_limit)?.checked_mul(retained)
    }
}

/// A region's surplus converted to carbon, and whether it counts toward the totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCredit {
    #[serde(flatten)]
    pub assessment: RegionAssessment,
    /// Tonnes of carbon; `None` when credits or density are undefined
    pub credits_c: Option<Decimal>,
    pub credited: bool,
}

/// Convert every assessed region to carbon. Regions without a density keep
/// their hectare figures but can never be credited under the lookup policy.
pub fn convert(
    assessments: Vec<RegionAssessment>,
    conversion: &CarbonConversion,
) -> Result<Vec<RegionCredit>, Overflow> {
    let policy = conversion.policy();
    assessments
        .into_iter()
        .map(|assessment| {
            let density = conversion.density(&assessment.country);
            let credits_c = match assessment.credits_ha.zip(density) {
                Some((ha, d)) => Some(
                    ha.checked_mul(d)
                        .ok_or_else(|| Overflow::new("carbon credits", &assessment.region))?,
                ),
                None => None,
            };
            let measure = match policy {
                DensityPolicy::RegionSpecific => credits_c,
                DensityPolicy::Flat => assessment.credits_ha,
            };
            let credited = measure.is_some_and(|m| m > Decimal::ZERO);
            Ok(RegionCredit {
                assessment,
                credits_c,
                credited,
            })
        })
        .collect()
}

/// Aggregate credit volume, value and share of the offset cap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditSummary {
    pub policy: DensityPolicy,
    pub regions_credited: usize,
    /// MtC
    pub c_credited: Decimal,
    /// MtCO2e
    pub co2_credited: Decimal,
    pub credit_value: Decimal,
    pub value_unit: &'static str,
    /// MtCO2e
    pub offsets: Decimal,
    pub redd_share: Decimal,
}

pub fn summarize(
    credits: &[RegionCredit],
    policy: DensityPolicy,
    market: &OffsetMarket,
) -> Result<CreditSummary, Overflow> {
    const TOTALS: &str = "credited regions";
    let credited: Vec<&RegionCredit> = credits.iter().filter(|c| c.credited).collect();
    let carbon = checked_sum(credited.iter().filter_map(|c| c.credits_c))
        .ok_or_else(|| Overflow::new("total carbon", TOTALS))?;

    let c_credited = carbon / MEGATONNE;
    let co2_credited =
        co2_from_carbon(c_credited).ok_or_else(|| Overflow::new("total CO2", TOTALS))?;
    let credit_value = co2_credited
        .checked_mul(market.price_per_tonne)
        .ok_or_else(|| Overflow::new("credit value", TOTALS))?
        / policy.value_divisor();
    let offsets = market
        .offsets()
        .ok_or_else(|| Overflow::new("offsets", "the offset cap"))?;
    let redd_share = co2_credited.checked_div(offsets).unwrap_or(Decimal::ZERO);

    log::info!(
        "{} of {} regions credited: {} MtCO2e",
        credited.len(),
        credits.len(),
        co2_credited.round_dp(4)
    );

    Ok(CreditSummary {
        policy,
        regions_credited: credited.len(),
        c_credited,
        co2_credited,
        credit_value,
        value_unit: policy.value_unit(),
        offsets,
        redd_share,
    })
}
