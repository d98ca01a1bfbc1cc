pub mod access_widener;
pub mod annotations;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod refmap;
pub mod resolution;
pub mod walker;

pub use access_widener::{AccessWidenerRemapper, AccessWidenerStats, RemappedAccessWidener};
pub use config::{RemapConfig, DEFAULT_PACKAGE_PREFIX};
pub use metrics::{MetricsCollector, RunMetrics};
pub use pipeline::{run, RunReport};
pub use refmap::{Refmap, RefmapBuilder};
pub use resolution::SymbolResolver;
