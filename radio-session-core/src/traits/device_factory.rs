use std::sync::Arc;

use crate::models::error::BackendFault;
use crate::traits::device_session::DeviceSession;

/// Entry point into a device backend.
///
/// The argument string is owned by the backend (typically a
/// `key=value,key=value` device address); this layer passes it through
/// untouched.
pub trait DeviceFactory: Send + Sync {
    /// Discover devices matching `args`, returning one address string per device.
    fn find(&self, args: &str) -> Result<Vec<String>, BackendFault>;

    /// Construct a session for the device addressed by `args`.
    fn make(&self, args: &str) -> Result<Arc<dyn DeviceSession>, BackendFault>;
}
