//! tracedrop Core - Domain types, configuration and ports
//!
//! This crate contains the pieces shared by every other tracedrop crate:
//! - **Domain types** - `CrashRecord`, `PendingBatch` and the crash file naming rules
//! - **Configuration** - typed YAML configuration with validation and a builder
//! - **Port definitions** - Traits for collaborators: `HostLookup`, `SubmitObserver`, `CrashTransport`
//!
//! # Architecture
//!
//! The domain module is plain data with no I/O beyond parsing an already
//! opened reader. Ports define the trait interfaces that the capture and
//! submission crates (or the embedding host) implement.

pub mod config;
pub mod domain;
pub mod ports;
