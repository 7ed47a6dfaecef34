//! # radio-session-core
//!
//! Handle-indirection layer between callers and radio device backends.
//!
//! Callers never hold a backend object directly. They hold small handles
//! (a device slot index, or a device index plus streamer position) and every
//! operation resolves the handle through the process-wide registry, runs the
//! backend call inside a failure boundary, and caches the error message on
//! the handle that issued it.
//!
//! ## Architecture
//!
//! ```text
//! radio-session-core (this crate)
//! ├── traits/     ← DeviceFactory, DeviceSession, RxStreamer, TxStreamer
//! ├── models/     ← SessionError, ErrorCode, SlotIndex, StreamArgs, TuneRequest, etc.
//! ├── registry/   ← ResourceRegistry (slot table, streamer vectors, activity gates)
//! ├── handle/     ← DeviceHandle, RxStreamerHandle, TxStreamerHandle, LastError
//! ├── capture/    ← FailureBoundary (fault/panic conversion, error recording)
//! ├── lifecycle/  ← HandleManager (make/free devices and streamers)
//! ├── ops/        ← DeviceOps, RxStreamerOps, TxStreamerOps (forwarding)
//! └── marshal/    ← fixed-buffer string copy, list joining
//! ```

pub mod capture;
pub mod handle;
pub mod lifecycle;
pub mod marshal;
pub mod models;
pub mod ops;
pub mod registry;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use capture::boundary::FailureBoundary;
pub use handle::device_handle::DeviceHandle;
pub use handle::last_error::LastError;
pub use handle::streamer_handle::{RxStreamerHandle, StreamLocation, TxStreamerHandle};
pub use lifecycle::manager::HandleManager;
pub use models::config::ManagerConfig;
pub use models::error::{BackendFault, ErrorCode, FaultKind, SessionError};
pub use models::info::{ChannelInfo, EepromMap};
pub use models::metadata::{AsyncEventCode, AsyncMetadata, RxErrorCode, RxMetadata, TxMetadata};
pub use models::range::{MetaRange, Range};
pub use models::sensor::{SensorReading, SensorValue};
pub use models::slot::{Direction, SlotIndex};
pub use models::stream::{StreamArgs, StreamCommand, StreamMode};
pub use models::time::TimeSpec;
pub use models::tune::{TunePolicy, TuneRequest, TuneResult};
pub use ops::device_ops::DeviceOps;
pub use ops::streamer_ops::{RxStreamerOps, TxStreamerOps};
pub use registry::resource_registry::ResourceRegistry;
pub use traits::device_factory::DeviceFactory;
pub use traits::device_session::{BackendResult, DeviceSession};
pub use traits::streamer::{RxStreamer, TxStreamer};
