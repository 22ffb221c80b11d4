pub mod actors;
pub mod config;
pub mod metric;
pub mod storage;
pub mod util;

pub use metric::{Metric, MetricError, MetricKind};
