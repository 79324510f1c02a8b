//! Domain types used throughout the resolver.
//!
//! This module defines:
//!
//! - distribution families and unit conventions (`DistributionFamily`, `Normalization`)
//! - validated sample inputs (`SampleSeries`, `GrainSizeDataset`)
//! - fit outputs (`FitReport`, `ComponentStatistics`, `ReportFile`)
//! - the configuration surface (`FitSettings`)

pub mod settings;
pub mod types;

pub use settings::*;
pub use types::*;
