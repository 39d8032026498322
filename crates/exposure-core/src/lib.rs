//! Hazard-exposure zonal aggregation engine.
//!
//! Fuses hazard rasters into tiered hazard levels, reduces population by
//! tier for every administrative zone in one multi-band pass per zone, and
//! aggregates zone metrics to provinces and a national total.

pub mod aggregate;
pub mod algebra;
pub mod config;
pub mod error;
pub mod fusion;
pub mod pipeline;
pub mod raster;
pub mod reduce;
pub mod report;
pub mod stats;
pub mod table;
pub mod zone;

pub use aggregate::{aggregate, rank, NationalTotals, ProvinceStatistics, RankMetric, Ranked};
pub use config::{
    ExposureConfig, HazardKind, HazardModel, MetricSet, ReductionConfig, ThresholdRule, TierBin, TierScheme,
    TriggerRange,
};
pub use error::{AggregateError, ConfigError, ExposureError, FusionError, RasterError, ReductionError};
pub use fusion::{fuse, HazardLevelRaster};
pub use pipeline::ExposurePipeline;
pub use raster::{Band, Grid, Raster};
pub use reduce::{reduce, BandSums};
pub use report::{ExposureReport, FailedZone, ZoneStatus, ZoneStatusEntry};
pub use stats::{exposure_stack, ZoneStatistics};
pub use zone::{Zone, ZoneRef};
