use parking_lot::Mutex;

use crate::marshal::buffer::copy_str_to_buffer;

/// The last error message recorded on one handle.
///
/// Owned by the handle, so independent handles never overwrite each other's
/// text. The lock only protects the string itself; callers serialize their
/// own use of a single handle.
#[derive(Debug, Default)]
pub struct LastError {
    message: Mutex<String>,
}

impl LastError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> String {
        self.message.lock().clone()
    }

    pub fn set(&self, message: impl Into<String>) {
        *self.message.lock() = message.into();
    }

    /// Write the message into `buffer`, NUL-terminated and truncated to fit.
    pub fn copy_into(&self, buffer: &mut [u8]) -> usize {
        copy_str_to_buffer(&self.message.lock(), buffer)
    }
}
