//! TimeGrid Core - Domain types and ports for the offline core
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `QueuedOperation`, `ShadowRecord`, `AuthSession`,
//!   `EncryptedSessionBlob`, `QuotaSnapshot`, `SyncEvent`
//! - **Port definitions** - Traits for adapters: `IStorageEngine`,
//!   `IEntityClient`, `IOperationHandler`, `INetworkStatus`, `IEventSink`, `IClock`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module has no I/O. Ports define the trait interfaces that the
//! adapter crates (`timegrid-cache`, `timegrid-remote`) implement and that the
//! service crates (`timegrid-sync`, `timegrid-vault`) consume.

pub mod config;
pub mod domain;
pub mod ports;
