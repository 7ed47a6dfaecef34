//! `rs_rx_streamer_*` and `rs_tx_streamer_*` functions.
//!
//! Sample buffers are passed as one pointer per streamer channel, each
//! holding `samps_per_buff` items of the streamer's cpu format.

use std::ffi::c_void;
use std::os::raw::c_char;
use std::time::Duration;

use radio_session_core::{ErrorCode, StreamCommand, TimeSpec, TxMetadata};

use crate::types::{self, RsAsyncMetadata, RsRxMetadata, RsRxStreamer, RsStreamCmd, RsTxMetadata, RsTxStreamer};
use crate::{byte_buffer, guard, invalid_argument, manager, out_ptr, status};

unsafe fn rx<'a>(ptr: *mut RsRxStreamer) -> Result<&'a RsRxStreamer, ErrorCode> {
    unsafe { ptr.as_ref() }.ok_or(ErrorCode::InvalidHandle)
}

unsafe fn tx<'a>(ptr: *mut RsTxStreamer) -> Result<&'a RsTxStreamer, ErrorCode> {
    unsafe { ptr.as_ref() }.ok_or(ErrorCode::InvalidHandle)
}

fn timeout(op: &str, secs: f64) -> Result<Duration, ErrorCode> {
    Duration::try_from_secs_f64(secs).map_err(|_| invalid_argument(op, "timeout must be a non-negative number of seconds"))
}

fn stream_cmd(op: &str, raw: &RsStreamCmd) -> Result<StreamCommand, ErrorCode> {
    let mode = types::stream_mode(raw.stream_mode).ok_or_else(|| invalid_argument(op, "unknown stream mode"))?;
    Ok(StreamCommand {
        mode,
        num_samps: raw.num_samps,
        stream_now: raw.stream_now,
        time_spec: TimeSpec::new(raw.time_spec_full_secs, raw.time_spec_frac_secs),
    })
}

/// Gather `count` channel pointers from a C array.
///
/// # Safety
///
/// `buffs` must be null or point to `count` pointers.
unsafe fn channel_pointers<'a, T>(op: &str, buffs: *const *mut T, count: usize) -> Result<&'a [*mut T], ErrorCode> {
    if buffs.is_null() {
        return Err(invalid_argument(op, "null buffer array"));
    }
    let ptrs = unsafe { std::slice::from_raw_parts(buffs, count) };
    if ptrs.iter().any(|p| p.is_null()) {
        return Err(invalid_argument(op, "null channel buffer"));
    }
    Ok(ptrs)
}

// --- rx ---

/// Release an RX streamer handle and null `*streamer`.
///
/// The streamer itself stays with its device until the device is freed.
///
/// # Safety
///
/// `streamer` must be valid for reads and writes; `*streamer` null or a
/// live pointer from `rs_device_get_rx_stream`.
#[no_mangle]
pub unsafe extern "C" fn rs_rx_streamer_free(streamer: *mut *mut RsRxStreamer) -> ErrorCode {
    guard("rs_rx_streamer_free", || {
        let slot = unsafe { out_ptr("rx_streamer_free", streamer) }?;
        if slot.is_null() {
            return Err(ErrorCode::InvalidHandle);
        }
        let boxed = unsafe { Box::from_raw(*slot) };
        *slot = std::ptr::null_mut();
        status(manager().free_rx_stream(boxed.handle))
    })
}

/// # Safety
///
/// `streamer` must be null or live; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_rx_streamer_last_error(
    streamer: *mut RsRxStreamer,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_rx_streamer_last_error", || {
        let s = unsafe { rx(streamer) }?;
        let buf = unsafe { byte_buffer("rx_streamer_last_error", buffer, len) }?;
        s.handle.last_error_into(buf);
        Ok(())
    })
}

/// # Safety
///
/// `streamer` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_rx_streamer_num_channels(streamer: *mut RsRxStreamer, out: *mut usize) -> ErrorCode {
    guard("rs_rx_streamer_num_channels", || {
        let s = unsafe { rx(streamer) }?;
        let out = unsafe { out_ptr("rx_streamer_num_channels", out) }?;
        *out = status(manager().rx_streamer(&s.handle).num_channels())?;
        Ok(())
    })
}

/// # Safety
///
/// `streamer` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_rx_streamer_max_num_samps(streamer: *mut RsRxStreamer, out: *mut usize) -> ErrorCode {
    guard("rs_rx_streamer_max_num_samps", || {
        let s = unsafe { rx(streamer) }?;
        let out = unsafe { out_ptr("rx_streamer_max_num_samps", out) }?;
        *out = status(manager().rx_streamer(&s.handle).max_num_samps())?;
        Ok(())
    })
}

/// Receive up to `samps_per_buff` items per channel.
///
/// A timeout is not an error: the call returns `None`, writes 0 to
/// `items_recvd` and sets the metadata error code to timeout.
///
/// # Safety
///
/// `streamer` must be null or live; `buffs` must hold one pointer per
/// streamer channel, each writable for `samps_per_buff` items; `md` and
/// `items_recvd` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_rx_streamer_recv(
    streamer: *mut RsRxStreamer,
    buffs: *const *mut c_void,
    samps_per_buff: usize,
    md: *mut RsRxMetadata,
    timeout_secs: f64,
    one_packet: bool,
    items_recvd: *mut usize,
) -> ErrorCode {
    const OP: &str = "rx_streamer_recv";
    guard("rs_rx_streamer_recv", || {
        let s = unsafe { rx(streamer) }?;
        let md = unsafe { out_ptr(OP, md) }?;
        let items_recvd = unsafe { out_ptr(OP, items_recvd) }?;
        *items_recvd = 0;
        let timeout = timeout(OP, timeout_secs)?;

        let ops = manager().rx_streamer(&s.handle);
        let channels = status(ops.num_channels())?;
        let ptrs = unsafe { channel_pointers(OP, buffs, channels) }?;
        let bytes = samps_per_buff.saturating_mul(s.item_size);
        let mut slices: Vec<&mut [u8]> = ptrs
            .iter()
            .map(|&p| unsafe { std::slice::from_raw_parts_mut(p.cast::<u8>(), bytes) })
            .collect();

        let (n, metadata) = status(ops.recv(&mut slices, samps_per_buff, timeout, one_packet))?;
        *items_recvd = n;
        *md = metadata.into();
        Ok(())
    })
}

/// # Safety
///
/// `streamer` must be null or live; `cmd` valid.
#[no_mangle]
pub unsafe extern "C" fn rs_rx_streamer_issue_stream_cmd(
    streamer: *mut RsRxStreamer,
    cmd: *const RsStreamCmd,
) -> ErrorCode {
    const OP: &str = "rx_streamer_issue_stream_cmd";
    guard("rs_rx_streamer_issue_stream_cmd", || {
        let s = unsafe { rx(streamer) }?;
        let raw = unsafe { cmd.as_ref() }.ok_or_else(|| invalid_argument(OP, "null stream command"))?;
        let cmd = stream_cmd(OP, raw)?;
        status(manager().rx_streamer(&s.handle).issue_stream_cmd(&cmd))
    })
}

// --- tx ---

/// Release a TX streamer handle and null `*streamer`.
///
/// # Safety
///
/// `streamer` must be valid for reads and writes; `*streamer` null or a
/// live pointer from `rs_device_get_tx_stream`.
#[no_mangle]
pub unsafe extern "C" fn rs_tx_streamer_free(streamer: *mut *mut RsTxStreamer) -> ErrorCode {
    guard("rs_tx_streamer_free", || {
        let slot = unsafe { out_ptr("tx_streamer_free", streamer) }?;
        if slot.is_null() {
            return Err(ErrorCode::InvalidHandle);
        }
        let boxed = unsafe { Box::from_raw(*slot) };
        *slot = std::ptr::null_mut();
        status(manager().free_tx_stream(boxed.handle))
    })
}

/// # Safety
///
/// `streamer` must be null or live; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_tx_streamer_last_error(
    streamer: *mut RsTxStreamer,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_tx_streamer_last_error", || {
        let s = unsafe { tx(streamer) }?;
        let buf = unsafe { byte_buffer("tx_streamer_last_error", buffer, len) }?;
        s.handle.last_error_into(buf);
        Ok(())
    })
}

/// # Safety
///
/// `streamer` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_tx_streamer_num_channels(streamer: *mut RsTxStreamer, out: *mut usize) -> ErrorCode {
    guard("rs_tx_streamer_num_channels", || {
        let s = unsafe { tx(streamer) }?;
        let out = unsafe { out_ptr("tx_streamer_num_channels", out) }?;
        *out = status(manager().tx_streamer(&s.handle).num_channels())?;
        Ok(())
    })
}

/// # Safety
///
/// `streamer` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_tx_streamer_max_num_samps(streamer: *mut RsTxStreamer, out: *mut usize) -> ErrorCode {
    guard("rs_tx_streamer_max_num_samps", || {
        let s = unsafe { tx(streamer) }?;
        let out = unsafe { out_ptr("tx_streamer_max_num_samps", out) }?;
        *out = status(manager().tx_streamer(&s.handle).max_num_samps())?;
        Ok(())
    })
}

/// Send `samps_per_buff` items per channel. `md` may be null for default
/// metadata.
///
/// # Safety
///
/// `streamer` must be null or live; `buffs` must hold one pointer per
/// streamer channel, each readable for `samps_per_buff` items; `md` null or
/// valid; `items_sent` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_tx_streamer_send(
    streamer: *mut RsTxStreamer,
    buffs: *const *const c_void,
    samps_per_buff: usize,
    md: *const RsTxMetadata,
    timeout_secs: f64,
    items_sent: *mut usize,
) -> ErrorCode {
    const OP: &str = "tx_streamer_send";
    guard("rs_tx_streamer_send", || {
        let s = unsafe { tx(streamer) }?;
        let items_sent = unsafe { out_ptr(OP, items_sent) }?;
        *items_sent = 0;
        let timeout = timeout(OP, timeout_secs)?;
        let metadata = unsafe { md.as_ref() }.map(TxMetadata::from).unwrap_or_default();

        let ops = manager().tx_streamer(&s.handle);
        let channels = status(ops.num_channels())?;
        let ptrs = unsafe { channel_pointers(OP, buffs.cast::<*mut c_void>(), channels) }?;
        let bytes = samps_per_buff.saturating_mul(s.item_size);
        let slices: Vec<&[u8]> = ptrs
            .iter()
            .map(|&p| unsafe { std::slice::from_raw_parts(p.cast::<u8>().cast_const(), bytes) })
            .collect();

        *items_sent = status(ops.send(&slices, samps_per_buff, &metadata, timeout))?;
        Ok(())
    })
}

/// Wait up to `timeout_secs` for an async TX event.
///
/// `*valid` tells whether `*md` was filled.
///
/// # Safety
///
/// `streamer` must be null or live; `md` and `valid` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_tx_streamer_recv_async_msg(
    streamer: *mut RsTxStreamer,
    md: *mut RsAsyncMetadata,
    timeout_secs: f64,
    valid: *mut bool,
) -> ErrorCode {
    const OP: &str = "tx_streamer_recv_async_msg";
    guard("rs_tx_streamer_recv_async_msg", || {
        let s = unsafe { tx(streamer) }?;
        let md = unsafe { out_ptr(OP, md) }?;
        let valid = unsafe { out_ptr(OP, valid) }?;
        *valid = false;
        let timeout = timeout(OP, timeout_secs)?;

        if let Some(event) = status(manager().tx_streamer(&s.handle).recv_async_msg(timeout))? {
            *md = event.into();
            *valid = true;
        }
        Ok(())
    })
}
