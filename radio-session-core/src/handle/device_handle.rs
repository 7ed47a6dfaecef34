use std::fmt;

use crate::handle::last_error::LastError;
use crate::models::slot::SlotIndex;

/// Caller-held token for a device session.
///
/// Carries only the slot index, never a reference to the session, so the
/// registry stays the sole authority on whether the device is alive.
pub struct DeviceHandle {
    index: SlotIndex,
    last_error: LastError,
}

impl DeviceHandle {
    pub(crate) fn new(index: SlotIndex) -> Self {
        Self {
            index,
            last_error: LastError::new(),
        }
    }

    pub fn index(&self) -> SlotIndex {
        self.index
    }

    /// The message of the last failed operation on this handle.
    pub fn last_error(&self) -> String {
        self.last_error.get()
    }

    /// Copy the last error into a fixed buffer, NUL-terminated.
    pub fn last_error_into(&self, buffer: &mut [u8]) -> usize {
        self.last_error.copy_into(buffer)
    }

    pub(crate) fn error_slot(&self) -> &LastError {
        &self.last_error
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle").field("index", &self.index).finish()
    }
}
