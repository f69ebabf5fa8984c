//! Session orchestration.
//!
//! ```text
//! farm/
//! ├── proxy_pool.rs    # capacity-bounded proxy assignment + journal
//! ├── registry.rs      # eligible accounts and initial proxies
//! ├── runner/          # per-account state machine and timing policy
//! ├── stats.rs         # concurrent per-account counters
//! └── orchestrator.rs  # spawn, shutdown, summary
//! ```

pub mod orchestrator;
pub mod proxy_pool;
pub mod registry;
pub mod runner;
pub mod stats;

pub use orchestrator::Orchestrator;
pub use proxy_pool::{PoolEvent, PoolOp, ProxyLease, ProxyPool, ProxySlotSnapshot};
pub use registry::{SessionEntry, SessionRegistry};
pub use runner::{RunnerContext, RunnerSettings, RunnerStatus, SessionOutcome, SessionRunner};
pub use stats::StatsAggregator;
