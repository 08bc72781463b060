//! Candidate pool construction and the screening funnel.

pub mod config;
pub mod funnel;
pub mod pool;

pub use config::{FunnelConfig, PoolConfig};
pub use funnel::{FunnelEngine, FunnelReport, Pick, ReasonCode};
pub use pool::{Candidate, PoolBuilder, PoolStrategy};
