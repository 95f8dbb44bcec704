mod backfill;
mod collator;
mod describe;
mod latency_lock;
mod operator;
mod phase;
mod rate_tracker;
mod stream;

pub use backfill::BackfillOperation;
pub use collator::ErrorCollator;
pub use describe::DescribeOperation;
pub use latency_lock::LatencyLock;
pub use operator::{Operator, OperatorPhase};
pub use phase::{OperationPhase, Phase, TransitionError};
pub use rate_tracker::RateTracker;
pub use stream::StreamOperation;

use std::time::Duration;

/// Capacity of the record buffer between producers and writers. Filling it
/// is the pipeline's only throttle.
pub(crate) const RECORD_BUFFER_SIZE: usize = 3500;

pub(crate) const RATE_WINDOW: Duration = Duration::from_secs(9);

pub(crate) const COMPLETE_MSG: &str = "-COMPLETE-";
pub(crate) const ERRORED_MSG: &str = "-ERRORED-";
pub(crate) const PENDING_MSG: &str = "-- PENDING --";
