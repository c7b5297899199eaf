//! Selling Partner API modules: region routing, HTTP client, and normalized models.

pub mod client;
pub mod models;
pub mod normalize;
pub mod regions;
pub mod router;

pub use client::{CatalogApi, RemoteRequest, SpApiClient};
pub use models::{Money, OfferSummary, RestrictionStatus};
pub use regions::{Marketplace, Profile, Region, RegionKey};
pub use router::{ClientFactory, ClientHandle, RegionRouter, Route, SpApiFactory};
