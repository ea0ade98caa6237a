pub mod aggregate;
pub mod baseline;
pub mod config;
pub mod credits;
pub mod density;
pub mod extract;
pub mod pipeline;
pub mod warnings;

// Flat public surface for the command layer.
pub use config::{Config, DensityPolicy};
pub use credits::{CreditSummary, RegionCredit};
pub use density::CarbonDensityRecord;
pub use pipeline::Estimate;
pub use warnings::Warning;
