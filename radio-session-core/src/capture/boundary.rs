use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::handle::last_error::LastError;
use crate::marshal::buffer::truncate_on_char_boundary;
use crate::models::config::ManagerConfig;
use crate::models::error::{BackendFault, SessionError};

/// The failure boundary every handle operation runs inside.
///
/// Backend faults come back as `Err(BackendFault)`; backend panics are
/// caught here and reported as `SessionError::Unknown`. Either way the
/// message lands on the handle that issued the call and the error kind is
/// returned to the caller.
#[derive(Debug, Clone)]
pub struct FailureBoundary {
    max_error_len: usize,
}

impl FailureBoundary {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            max_error_len: config.max_error_len,
        }
    }

    /// Invoke a backend operation, converting faults and panics.
    pub fn call<T>(&self, op: &str, f: impl FnOnce() -> Result<T, BackendFault>) -> Result<T, SessionError> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result.map_err(SessionError::from),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("backend panicked in {}: {}", op, message);
                Err(SessionError::Unknown(message))
            }
        }
    }

    /// Store the error of a failed result on `slot`. Successful results
    /// leave the previous message in place.
    pub fn record<T>(&self, slot: &LastError, op: &str, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(ref e) = result {
            let message = format!("{}: {}", op, e);
            log::debug!("{}", message);
            slot.set(truncate_on_char_boundary(&message, self.max_error_len));
        }
        result
    }
}

impl Default for FailureBoundary {
    fn default() -> Self {
        Self::new(&ManagerConfig::default())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "backend panicked with a non-string payload".into()
    }
}
