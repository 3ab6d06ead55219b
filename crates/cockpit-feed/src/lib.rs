//! Pull path and reconciliation for the trading cockpit.
//!
//! - [`poller`]: keyed interval polling with at most one in-flight request per key
//! - [`aggregator`]: merges partial updates from push and pull into one
//!   classified, broadcast view

pub mod aggregator;
pub mod error;
pub mod poller;

pub use aggregator::{classify_field, ReconciledView, StateAggregator};
pub use error::{PollError, PollResult};
pub use poller::{PollHandle, Poller, TickReport};
