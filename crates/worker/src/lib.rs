//! Worker runtime for satchel.
//!
//! This crate provides the offline caching and request-interception
//! runtime: request descriptors, the route table, the three cache
//! strategies, the namespace registry with its eviction sweeps, the
//! precache installer, and the control-message handler.

pub mod clock;
pub mod control;
pub mod fetch;
pub mod filter;
pub mod namespace;
pub mod precache;
pub mod request;
pub mod routes;
pub mod strategy;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use control::ControlMessage;
pub use fetch::{BackendResponse, FetchConfig, HttpBackend, ReqwestBackend};
pub use filter::CacheableFilter;
pub use namespace::{ExpirationPolicy, Namespace, NamespaceSpec, Registry};
pub use request::{Destination, RequestDescriptor};
pub use routes::{RoutePredicate, RouteRule, RouteTable, StrategyKind};
pub use strategy::{Served, ServedSource};
pub use worker::{Outcome, Worker};

#[cfg(test)]
pub(crate) mod testing;
