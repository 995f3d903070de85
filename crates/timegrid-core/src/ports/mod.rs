//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! offline core. Ports are interfaces that the services depend on, but
//! whose implementations live in adapter crates or in the host application.
//!
//! ## Ports Overview
//!
//! - [`IStorageEngine`] / [`IEngineProvider`] - Namespaced key-value storage media
//! - [`IEntityClient`] / [`IOperationHandler`] - Remote API writes
//! - [`INetworkStatus`] - Connectivity state and transitions
//! - [`IClock`] - Wall-clock time
//! - [`IEventSink`] - Events for the UI layer

pub mod network;
pub mod notification;
pub mod remote;
pub mod storage_engine;

pub use network::{IClock, INetworkStatus, SystemClock};
pub use notification::{IEventSink, NullEventSink};
pub use remote::{ApplyOutcome, IEntityClient, IOperationHandler, RemoteError};
pub use storage_engine::{IEngineProvider, IStorageEngine, StorageError, StorageEstimate};
