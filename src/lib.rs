//! catalog-fanout - Marketplace catalog fan-out proxy
//!
//! Fans listing-restriction and offer lookups for a batch of ASINs out
//! across Amazon marketplaces, with bounded concurrency, per-call retries,
//! and one aggregated result per ASIN and marketplace.

pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod marketplace;
pub mod retry;
pub mod server;
pub mod service;

pub use aggregate::{AggregatedResult, Aggregator, Slot, SlotState};
pub use config::Config;
pub use dispatch::TaskOutcome;
pub use error::{Error, Failure, FailureKind, RemoteError};
pub use marketplace::{Marketplace, RegionRouter};
pub use service::{BatchRequest, CatalogService, ScanResponse};
