//! # radio-session-capi
//!
//! C interface over radio-session handles.
//!
//! Device and streamer handles are boxed and handed out as opaque pointers.
//! Every function returns an [`ErrorCode`]; results land in caller-provided
//! out-pointers and fixed-capacity string buffers. Messages for failures on
//! a live handle are cached on that handle (`rs_device_last_error`,
//! `rs_rx_streamer_last_error`, `rs_tx_streamer_last_error`). Failures with
//! no handle to carry them (a failed make, a null argument, a caught panic)
//! go to a thread-local slot read with [`rs_get_last_error`].
//!
//! The device functions cover rates, tuning, gains, antennas, bandwidth,
//! sensors, clock and time sources, EEPROM fields, GPIO and user registers.
//! Range queries, time-of-day and command time, subdev specs, normalized
//! gain, AGC and DC/IQ correction are only available from Rust through
//! [`radio_session_core::DeviceOps`].
//!
//! ```c
//! rs_device_handle *dev = NULL;
//! if (rs_device_make(&dev, "type=test") != RS_ERROR_NONE) {
//!     char msg[256];
//!     rs_get_last_error(msg, sizeof msg);
//! }
//! rs_device_set_rate(dev, RS_DIR_RX, 1e6, 0);
//! rs_device_free(&dev); /* dev is now NULL */
//! ```
//!
//! ## Architecture
//!
//! ```text
//! radio-session-capi (this crate)
//! ├── types.rs     ← repr(C) argument/metadata structs, boxed streamer wrappers
//! ├── device.rs    ← rs_device_* functions
//! └── streamer.rs  ← rs_rx_streamer_* / rs_tx_streamer_* functions
//! ```

pub mod device;
pub mod streamer;
pub mod types;

use std::cell::RefCell;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock, OnceLock};

use radio_session_core::marshal::copy_str_to_buffer;
use radio_session_core::{DeviceFactory, ErrorCode, HandleManager, SessionError};
use radio_session_sim::SimFactory;

pub use radio_session_core::DeviceHandle;
pub use types::{RsRxStreamer, RsTxStreamer};

static FACTORY: OnceLock<Arc<dyn DeviceFactory>> = OnceLock::new();

static MANAGER: LazyLock<HandleManager> = LazyLock::new(|| {
    let factory = FACTORY.get_or_init(|| Arc::new(SimFactory::new()));
    HandleManager::new(Arc::clone(factory))
});

thread_local! {
    static LAST_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Replace the backend used by the C interface.
///
/// Only takes effect before the first `rs_*` call; returns `false` once a
/// factory is in place.
pub fn install_factory(factory: Arc<dyn DeviceFactory>) -> bool {
    FACTORY.set(factory).is_ok()
}

pub(crate) fn manager() -> &'static HandleManager {
    &MANAGER
}

pub(crate) fn set_last_error(message: impl Into<String>) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = message.into());
}

/// Record a failure that has no handle to carry it and return its code.
pub(crate) fn fail(op: &str, err: SessionError) -> ErrorCode {
    log::debug!("{} failed: {}", op, err);
    set_last_error(format!("{}: {}", op, err));
    err.code()
}

/// Status for a handle operation; the message is already on the handle.
pub(crate) fn status<T>(result: Result<T, SessionError>) -> Result<T, ErrorCode> {
    result.map_err(|e| e.code())
}

/// Run one exported function body, turning a panic into `Unknown`.
pub(crate) fn guard(name: &str, f: impl FnOnce() -> Result<(), ErrorCode>) -> ErrorCode {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrorCode::None,
        Ok(Err(code)) => code,
        Err(_) => {
            log::error!("panic in {}", name);
            set_last_error(format!("{}: panic", name));
            ErrorCode::Unknown
        }
    }
}

pub(crate) fn invalid_argument(op: &str, what: &str) -> ErrorCode {
    set_last_error(format!("{}: {}", op, what));
    ErrorCode::Value
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn c_str<'a>(op: &str, ptr: *const c_char) -> Result<&'a str, ErrorCode> {
    if ptr.is_null() {
        return Err(invalid_argument(op, "null string argument"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| invalid_argument(op, "string argument is not valid UTF-8"))
}

/// Like [`c_str`], but a null pointer reads as the empty string.
///
/// # Safety
///
/// Same as [`c_str`].
pub(crate) unsafe fn c_str_or_empty<'a>(op: &str, ptr: *const c_char) -> Result<&'a str, ErrorCode> {
    if ptr.is_null() {
        return Ok("");
    }
    unsafe { c_str(op, ptr) }
}

/// # Safety
///
/// `ptr` must be null or valid for writes of one `T` for `'a`.
pub(crate) unsafe fn out_ptr<'a, T>(op: &str, ptr: *mut T) -> Result<&'a mut T, ErrorCode> {
    unsafe { ptr.as_mut() }.ok_or_else(|| invalid_argument(op, "null output pointer"))
}

/// # Safety
///
/// `ptr` must be null or valid for writes of `len` bytes for `'a`.
pub(crate) unsafe fn byte_buffer<'a>(op: &str, ptr: *mut c_char, len: usize) -> Result<&'a mut [u8], ErrorCode> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(invalid_argument(op, "null string buffer"));
    }
    Ok(unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), len) })
}

/// Copy the calling thread's last handle-less error message into `buffer`.
///
/// The copy is truncated to `len - 1` bytes and always NUL-terminated.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_get_last_error(buffer: *mut c_char, len: usize) -> ErrorCode {
    guard("rs_get_last_error", || {
        let buf = unsafe { byte_buffer("get_last_error", buffer, len) }?;
        LAST_ERROR.with(|cell| copy_str_to_buffer(&cell.borrow(), buf));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_is_thread_local() {
        set_last_error("make_device: device construction failed: boom");
        std::thread::spawn(|| {
            let mut buf = [0x55 as c_char; 16];
            assert_eq!(unsafe { rs_get_last_error(buf.as_mut_ptr(), buf.len()) }, ErrorCode::None);
            assert_eq!(buf[0], 0);
        })
        .join()
        .unwrap();

        let mut buf = [0 as c_char; 12];
        assert_eq!(unsafe { rs_get_last_error(buf.as_mut_ptr(), buf.len()) }, ErrorCode::None);
        let text = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap();
        assert_eq!(text, "make_device");
    }

    #[test]
    fn guard_converts_panics() {
        let code = guard("rs_test", || panic!("boom"));
        assert_eq!(code, ErrorCode::Unknown);
        assert_eq!(LAST_ERROR.with(|cell| cell.borrow().clone()), "rs_test: panic");
    }

    #[test]
    fn null_buffer_is_rejected_unless_empty() {
        assert_eq!(unsafe { rs_get_last_error(std::ptr::null_mut(), 0) }, ErrorCode::None);
        assert_eq!(unsafe { rs_get_last_error(std::ptr::null_mut(), 8) }, ErrorCode::Value);
    }

    #[test]
    fn factory_is_fixed_after_first_use() {
        let _ = manager();
        assert!(!install_factory(Arc::new(SimFactory::new())));
    }
}
