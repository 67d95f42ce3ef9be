//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IReportDelivery`] - Submission of serialized reports to the endpoint
//! - [`IOfflineStore`] - Durable queue of reports awaiting delivery

pub mod delivery;
pub mod offline_store;

pub use delivery::{DeliveryOutcome, IReportDelivery};
pub use offline_store::{CorruptRecord, IOfflineStore, PageRequest, StoredRecord};
