//! Operational statistics for the tilt module.

pub mod log;

pub use log::{
    create_shared_stats, create_shared_stats_with_persistence, ModuleStats, PersistedStats,
    SharedModuleStats, StatsSnapshot,
};
