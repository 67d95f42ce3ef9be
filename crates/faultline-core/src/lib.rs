//! Faultline Core - Domain model and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Report`, `CapturedException`, `ExceptionStack`, `ReportPayload`, `DatabaseRecord`
//! - **Attribute rules** - `AttributeValue` and the merge precedence used for every send
//! - **Port definitions** - Traits for adapters: `IReportDelivery`, `IOfflineStore`
//! - **Configuration** - YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
