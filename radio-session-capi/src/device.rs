//! `rs_device_*` functions.
//!
//! Every function takes the boxed [`DeviceHandle`] as its first argument.
//! A null handle yields `InvalidDevice`; a handle whose device was freed
//! also yields `InvalidDevice` and records the message on the handle.

use std::os::raw::{c_char, c_int};

use radio_session_core::marshal::{copy_str_to_buffer, join_list, join_list_with};
use radio_session_core::{BackendFault, DeviceHandle, Direction, EepromMap, ErrorCode, SensorValue, StreamArgs, TuneRequest};

use crate::types::{self, RsRxStreamer, RsSensorValue, RsStreamArgs, RsTuneRequest, RsTuneResult, RsTxStreamer};
use crate::{byte_buffer, c_str, c_str_or_empty, fail, guard, invalid_argument, manager, out_ptr, status};

/// # Safety
///
/// `ptr` must be null or a pointer produced by [`rs_device_make`] that has
/// not been passed to [`rs_device_free`].
unsafe fn device<'a>(ptr: *mut DeviceHandle) -> Result<&'a DeviceHandle, ErrorCode> {
    unsafe { ptr.as_ref() }.ok_or(ErrorCode::InvalidDevice)
}

fn direction(op: &str, value: c_int) -> Result<Direction, ErrorCode> {
    types::direction(value).ok_or_else(|| invalid_argument(op, "direction must be 0 (rx) or 1 (tx)"))
}

/// Write a joined list and its element count.
///
/// # Safety
///
/// `buffer` must be null or valid for `len` bytes; `count` must be null or
/// valid for one write.
unsafe fn write_list(
    op: &str,
    items: &[String],
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> Result<(), ErrorCode> {
    let (joined, n) = join_list(items);
    unsafe { write_joined(op, &joined, n, buffer, len, count) }
}

unsafe fn write_joined(
    op: &str,
    joined: &str,
    n: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> Result<(), ErrorCode> {
    let buf = unsafe { byte_buffer(op, buffer, len) }?;
    copy_str_to_buffer(joined, buf);
    if let Some(count) = unsafe { count.as_mut() } {
        *count = n;
    }
    Ok(())
}

unsafe fn write_str(op: &str, text: &str, buffer: *mut c_char, len: usize) -> Result<(), ErrorCode> {
    let buf = unsafe { byte_buffer(op, buffer, len) }?;
    copy_str_to_buffer(text, buf);
    Ok(())
}

/// # Safety
///
/// `out` must be null or valid for one write; `buffer` valid for `len` bytes.
unsafe fn write_sensor(
    op: &str,
    value: &SensorValue,
    out: *mut RsSensorValue,
    buffer: *mut c_char,
    len: usize,
) -> Result<(), ErrorCode> {
    if let Some(out) = unsafe { out.as_mut() } {
        *out = value.into();
    }
    unsafe { write_str(op, &value.to_pp_string(), buffer, len) }
}

fn eeprom_field<'a>(op: &str, eeprom: &'a EepromMap, key: &str) -> Result<&'a str, ErrorCode> {
    eeprom
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| fail(op, BackendFault::key(format!("no eeprom field \"{}\"", key)).into()))
}

unsafe fn stream_args(op: &str, args: *const RsStreamArgs) -> Result<StreamArgs, ErrorCode> {
    let raw = unsafe { args.as_ref() }.ok_or_else(|| invalid_argument(op, "null stream args"))?;
    let defaults = StreamArgs::default();
    let cpu_format = match unsafe { c_str_or_empty(op, raw.cpu_format) }? {
        "" => defaults.cpu_format.as_str(),
        format => format,
    };
    let otw_format = match unsafe { c_str_or_empty(op, raw.otw_format) }? {
        "" => defaults.otw_format.as_str(),
        format => format,
    };
    let channels = match (raw.n_channels, raw.channel_list.is_null()) {
        (0, _) => Vec::new(),
        (_, true) => return Err(invalid_argument(op, "null channel list")),
        (n, false) => unsafe { std::slice::from_raw_parts(raw.channel_list, n) }.to_vec(),
    };
    let parsed = StreamArgs::new(cpu_format, otw_format)
        .with_args(unsafe { c_str_or_empty(op, raw.args) }?)
        .with_channels(channels);
    if parsed.cpu_item_size().is_none() {
        return Err(invalid_argument(
            op,
            &format!("unsupported cpu format \"{}\"", parsed.cpu_format),
        ));
    }
    Ok(parsed)
}

/// List devices matching `args`, written as `;`-separated device-args strings.
///
/// # Safety
///
/// `args` must be null or NUL-terminated; `buffer` valid for `len` bytes;
/// `count` null or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_find(
    args: *const c_char,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_find", || {
        let args = unsafe { c_str_or_empty("find_devices", args) }?;
        let found = manager().find_devices(args).map_err(|e| fail("find_devices", e))?;
        let (joined, n) = join_list_with(&found, ';');
        unsafe { write_joined("find_devices", &joined, n, buffer, len, count) }
    })
}

/// Construct a device and write a new handle to `*out`.
///
/// On failure `*out` is set to null and the message is available from
/// [`crate::rs_get_last_error`].
///
/// # Safety
///
/// `out` must be valid for one write; `args` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_make(out: *mut *mut DeviceHandle, args: *const c_char) -> ErrorCode {
    guard("rs_device_make", || {
        let out = unsafe { out_ptr("make_device", out) }?;
        *out = std::ptr::null_mut();
        let args = unsafe { c_str_or_empty("make_device", args) }?;
        let handle = manager().make_device(args).map_err(|e| fail("make_device", e))?;
        *out = Box::into_raw(Box::new(handle));
        Ok(())
    })
}

/// Destroy the device and release its handle, nulling `*dev`.
///
/// Freeing an already-null handle reports `InvalidDevice`.
///
/// # Safety
///
/// `dev` must be valid for reads and writes; `*dev` must be null or a live
/// pointer from [`rs_device_make`].
#[no_mangle]
pub unsafe extern "C" fn rs_device_free(dev: *mut *mut DeviceHandle) -> ErrorCode {
    guard("rs_device_free", || {
        let slot = unsafe { out_ptr("free_device", dev) }?;
        if slot.is_null() {
            return Err(ErrorCode::InvalidDevice);
        }
        let handle = unsafe { Box::from_raw(*slot) };
        *slot = std::ptr::null_mut();
        manager().free_device(&handle).map_err(|e| fail("free_device", e))
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_last_error(dev: *mut DeviceHandle, buffer: *mut c_char, len: usize) -> ErrorCode {
    guard("rs_device_last_error", || {
        let dev = unsafe { device(dev) }?;
        let buf = unsafe { byte_buffer("last_error", buffer, len) }?;
        dev.last_error_into(buf);
        Ok(())
    })
}

/// Build an RX streamer and write a new streamer handle to `*out`.
///
/// # Safety
///
/// `dev` must be null or live; `args` valid; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_rx_stream(
    dev: *mut DeviceHandle,
    args: *const RsStreamArgs,
    out: *mut *mut RsRxStreamer,
) -> ErrorCode {
    guard("rs_device_get_rx_stream", || {
        let dev = unsafe { device(dev) }?;
        let out = unsafe { out_ptr("get_rx_stream", out) }?;
        *out = std::ptr::null_mut();
        let args = unsafe { stream_args("get_rx_stream", args) }?;
        let handle = status(manager().make_rx_stream(dev, &args))?;
        let item_size = args.cpu_item_size().unwrap_or_default();
        *out = Box::into_raw(Box::new(RsRxStreamer { handle, item_size }));
        Ok(())
    })
}

/// Build a TX streamer and write a new streamer handle to `*out`.
///
/// # Safety
///
/// Same as [`rs_device_get_rx_stream`].
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_tx_stream(
    dev: *mut DeviceHandle,
    args: *const RsStreamArgs,
    out: *mut *mut RsTxStreamer,
) -> ErrorCode {
    guard("rs_device_get_tx_stream", || {
        let dev = unsafe { device(dev) }?;
        let out = unsafe { out_ptr("get_tx_stream", out) }?;
        *out = std::ptr::null_mut();
        let args = unsafe { stream_args("get_tx_stream", args) }?;
        let handle = status(manager().make_tx_stream(dev, &args))?;
        let item_size = args.cpu_item_size().unwrap_or_default();
        *out = Box::into_raw(Box::new(RsTxStreamer { handle, item_size }));
        Ok(())
    })
}

// --- mboard ---

/// # Safety
///
/// `dev` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_num_mboards(dev: *mut DeviceHandle, out: *mut usize) -> ErrorCode {
    guard("rs_device_get_num_mboards", || {
        let dev = unsafe { device(dev) }?;
        let out = unsafe { out_ptr("get_num_mboards", out) }?;
        *out = status(manager().device(dev).num_mboards())?;
        Ok(())
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_mboard_name(
    dev: *mut DeviceHandle,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_mboard_name", || {
        let dev = unsafe { device(dev) }?;
        let name = status(manager().device(dev).mboard_name(mboard))?;
        unsafe { write_str("get_mboard_name", &name, buffer, len) }
    })
}

/// # Safety
///
/// `dev` must be null or live.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_master_clock_rate(dev: *mut DeviceHandle, rate: f64, mboard: usize) -> ErrorCode {
    guard("rs_device_set_master_clock_rate", || {
        let dev = unsafe { device(dev) }?;
        status(manager().device(dev).set_master_clock_rate(rate, mboard))
    })
}

/// # Safety
///
/// `dev` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_master_clock_rate(dev: *mut DeviceHandle, mboard: usize, out: *mut f64) -> ErrorCode {
    guard("rs_device_get_master_clock_rate", || {
        let dev = unsafe { device(dev) }?;
        let out = unsafe { out_ptr("get_master_clock_rate", out) }?;
        *out = status(manager().device(dev).master_clock_rate(mboard))?;
        Ok(())
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_clock_sources(
    dev: *mut DeviceHandle,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_clock_sources", || {
        let dev = unsafe { device(dev) }?;
        let sources = status(manager().device(dev).clock_sources(mboard))?;
        unsafe { write_list("get_clock_sources", &sources, buffer, len, count) }
    })
}

/// # Safety
///
/// `dev` must be null or live; `source` NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_time_source(dev: *mut DeviceHandle, source: *const c_char, mboard: usize) -> ErrorCode {
    guard("rs_device_set_time_source", || {
        let dev = unsafe { device(dev) }?;
        let source = unsafe { c_str("set_time_source", source) }?;
        status(manager().device(dev).set_time_source(source, mboard))
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_time_source(
    dev: *mut DeviceHandle,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_time_source", || {
        let dev = unsafe { device(dev) }?;
        let source = status(manager().device(dev).time_source(mboard))?;
        unsafe { write_str("get_time_source", &source, buffer, len) }
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_time_sources(
    dev: *mut DeviceHandle,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_time_sources", || {
        let dev = unsafe { device(dev) }?;
        let sources = status(manager().device(dev).time_sources(mboard))?;
        unsafe { write_list("get_time_sources", &sources, buffer, len, count) }
    })
}

/// Read one mboard sensor. `out` may be null; `buffer` receives the
/// `"name: value unit"` form.
///
/// # Safety
///
/// `dev` must be null or live; `name` NUL-terminated; `out` null or valid
/// for one write; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_mboard_sensor(
    dev: *mut DeviceHandle,
    name: *const c_char,
    mboard: usize,
    out: *mut RsSensorValue,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_mboard_sensor", || {
        let dev = unsafe { device(dev) }?;
        let name = unsafe { c_str("get_mboard_sensor", name) }?;
        let value = status(manager().device(dev).mboard_sensor(name, mboard))?;
        unsafe { write_sensor("get_mboard_sensor", &value, out, buffer, len) }
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_mboard_sensor_names(
    dev: *mut DeviceHandle,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_mboard_sensor_names", || {
        let dev = unsafe { device(dev) }?;
        let names = status(manager().device(dev).mboard_sensor_names(mboard))?;
        unsafe { write_list("get_mboard_sensor_names", &names, buffer, len, count) }
    })
}

/// # Safety
///
/// `dev` must be null or live.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_user_register(dev: *mut DeviceHandle, addr: u8, data: u32, mboard: usize) -> ErrorCode {
    guard("rs_device_set_user_register", || {
        let dev = unsafe { device(dev) }?;
        status(manager().device(dev).set_user_register(addr, data, mboard))
    })
}

/// Read one field of the mboard EEPROM. A missing field reports `Key`
/// through [`crate::rs_get_last_error`].
///
/// # Safety
///
/// `dev` must be null or live; `key` NUL-terminated; `buffer` valid for
/// `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_mboard_eeprom(
    dev: *mut DeviceHandle,
    key: *const c_char,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_mboard_eeprom", || {
        let dev = unsafe { device(dev) }?;
        let key = unsafe { c_str("get_mboard_eeprom", key) }?;
        let eeprom = status(manager().device(dev).mboard_eeprom(mboard))?;
        let value = eeprom_field("get_mboard_eeprom", &eeprom, key)?;
        unsafe { write_str("get_mboard_eeprom", value, buffer, len) }
    })
}

/// Write one field of the mboard EEPROM; other fields are left alone.
///
/// # Safety
///
/// `dev` must be null or live; `key` and `value` NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_mboard_eeprom(
    dev: *mut DeviceHandle,
    key: *const c_char,
    value: *const c_char,
    mboard: usize,
) -> ErrorCode {
    guard("rs_device_set_mboard_eeprom", || {
        let dev = unsafe { device(dev) }?;
        let key = unsafe { c_str("set_mboard_eeprom", key) }?;
        let value = unsafe { c_str("set_mboard_eeprom", value) }?;
        let update = EepromMap::from([(key.to_string(), value.to_string())]);
        status(manager().device(dev).set_mboard_eeprom(&update, mboard))
    })
}

/// Read one field of a daughterboard EEPROM. `unit` is `"rx"`, `"tx"` or
/// `"gdb"`; a null or empty `slot` selects the default slot.
///
/// # Safety
///
/// `dev` must be null or live; `unit` and `key` NUL-terminated; `slot` null
/// or NUL-terminated; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_dboard_eeprom(
    dev: *mut DeviceHandle,
    unit: *const c_char,
    slot: *const c_char,
    key: *const c_char,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_dboard_eeprom", || {
        let op = "get_dboard_eeprom";
        let dev = unsafe { device(dev) }?;
        let unit = unsafe { c_str(op, unit) }?;
        let slot = unsafe { c_str_or_empty(op, slot) }?;
        let key = unsafe { c_str(op, key) }?;
        let eeprom = status(manager().device(dev).dboard_eeprom(unit, slot, mboard))?;
        let value = eeprom_field(op, &eeprom, key)?;
        unsafe { write_str(op, value, buffer, len) }
    })
}

/// # Safety
///
/// Same as [`rs_device_get_dboard_eeprom`], with `value` NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_dboard_eeprom(
    dev: *mut DeviceHandle,
    unit: *const c_char,
    slot: *const c_char,
    key: *const c_char,
    value: *const c_char,
    mboard: usize,
) -> ErrorCode {
    guard("rs_device_set_dboard_eeprom", || {
        let op = "set_dboard_eeprom";
        let dev = unsafe { device(dev) }?;
        let unit = unsafe { c_str(op, unit) }?;
        let slot = unsafe { c_str_or_empty(op, slot) }?;
        let update = EepromMap::from([(
            unsafe { c_str(op, key) }?.to_string(),
            unsafe { c_str(op, value) }?.to_string(),
        )]);
        status(manager().device(dev).set_dboard_eeprom(&update, unit, slot, mboard))
    })
}

// --- gpio ---

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_gpio_banks(
    dev: *mut DeviceHandle,
    mboard: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_gpio_banks", || {
        let dev = unsafe { device(dev) }?;
        let banks = status(manager().device(dev).gpio_banks(mboard))?;
        unsafe { write_list("get_gpio_banks", &banks, buffer, len, count) }
    })
}

/// Update the bits of `attr` selected by `mask`.
///
/// # Safety
///
/// `dev` must be null or live; `bank` and `attr` NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_gpio_attr(
    dev: *mut DeviceHandle,
    bank: *const c_char,
    attr: *const c_char,
    value: u32,
    mask: u32,
    mboard: usize,
) -> ErrorCode {
    guard("rs_device_set_gpio_attr", || {
        let dev = unsafe { device(dev) }?;
        let bank = unsafe { c_str("set_gpio_attr", bank) }?;
        let attr = unsafe { c_str("set_gpio_attr", attr) }?;
        status(manager().device(dev).set_gpio_attr(bank, attr, value, mask, mboard))
    })
}

/// # Safety
///
/// `dev` must be null or live; `bank` and `attr` NUL-terminated; `out`
/// valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_gpio_attr(
    dev: *mut DeviceHandle,
    bank: *const c_char,
    attr: *const c_char,
    mboard: usize,
    out: *mut u32,
) -> ErrorCode {
    guard("rs_device_get_gpio_attr", || {
        let dev = unsafe { device(dev) }?;
        let bank = unsafe { c_str("get_gpio_attr", bank) }?;
        let attr = unsafe { c_str("get_gpio_attr", attr) }?;
        let out = unsafe { out_ptr("get_gpio_attr", out) }?;
        *out = status(manager().device(dev).gpio_attr(bank, attr, mboard))?;
        Ok(())
    })
}

// --- rx / tx frontends; `dir` is RS_DIR_RX or RS_DIR_TX ---

/// # Safety
///
/// `dev` must be null or live.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_rate(dev: *mut DeviceHandle, dir: c_int, rate: f64, chan: usize) -> ErrorCode {
    guard("rs_device_set_rate", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("set_rate", dir)?;
        status(manager().device(dev).set_rate(dir, rate, chan))
    })
}

/// # Safety
///
/// `dev` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_rate(dev: *mut DeviceHandle, dir: c_int, chan: usize, out: *mut f64) -> ErrorCode {
    guard("rs_device_get_rate", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_rate", dir)?;
        let out = unsafe { out_ptr("get_rate", out) }?;
        *out = status(manager().device(dev).rate(dir, chan))?;
        Ok(())
    })
}

/// Tune a channel. `result` may be null when the caller does not need it.
///
/// # Safety
///
/// `dev` must be null or live; `request` valid; `result` null or valid for
/// one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_freq(
    dev: *mut DeviceHandle,
    dir: c_int,
    request: *const RsTuneRequest,
    chan: usize,
    result: *mut RsTuneResult,
) -> ErrorCode {
    guard("rs_device_set_freq", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("set_freq", dir)?;
        let raw = unsafe { request.as_ref() }.ok_or_else(|| invalid_argument("set_freq", "null tune request"))?;
        let policy = |value| {
            types::tune_policy(value).ok_or_else(|| invalid_argument("set_freq", "unknown tune policy"))
        };
        let request = TuneRequest {
            target_freq: raw.target_freq,
            rf_freq_policy: policy(raw.rf_freq_policy)?,
            rf_freq: raw.rf_freq,
            dsp_freq_policy: policy(raw.dsp_freq_policy)?,
            dsp_freq: raw.dsp_freq,
            args: String::new(),
        };
        let tuned = status(manager().device(dev).set_freq(dir, &request, chan))?;
        if let Some(result) = unsafe { result.as_mut() } {
            *result = tuned.into();
        }
        Ok(())
    })
}

/// # Safety
///
/// `dev` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_freq(dev: *mut DeviceHandle, dir: c_int, chan: usize, out: *mut f64) -> ErrorCode {
    guard("rs_device_get_freq", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_freq", dir)?;
        let out = unsafe { out_ptr("get_freq", out) }?;
        *out = status(manager().device(dev).freq(dir, chan))?;
        Ok(())
    })
}

/// Set the overall gain, or one named stage when `name` is non-empty.
///
/// # Safety
///
/// `dev` must be null or live; `name` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_gain(
    dev: *mut DeviceHandle,
    dir: c_int,
    gain: f64,
    chan: usize,
    name: *const c_char,
) -> ErrorCode {
    guard("rs_device_set_gain", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("set_gain", dir)?;
        let name = unsafe { c_str_or_empty("set_gain", name) }?;
        status(manager().device(dev).set_gain(dir, gain, chan, name))
    })
}

/// # Safety
///
/// `dev` must be null or live; `name` null or NUL-terminated; `out` valid
/// for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_gain(
    dev: *mut DeviceHandle,
    dir: c_int,
    chan: usize,
    name: *const c_char,
    out: *mut f64,
) -> ErrorCode {
    guard("rs_device_get_gain", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_gain", dir)?;
        let name = unsafe { c_str_or_empty("get_gain", name) }?;
        let out = unsafe { out_ptr("get_gain", out) }?;
        *out = status(manager().device(dev).gain(dir, chan, name))?;
        Ok(())
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_gain_names(
    dev: *mut DeviceHandle,
    dir: c_int,
    chan: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_gain_names", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_gain_names", dir)?;
        let names = status(manager().device(dev).gain_names(dir, chan))?;
        unsafe { write_list("get_gain_names", &names, buffer, len, count) }
    })
}

/// # Safety
///
/// `dev` must be null or live; `antenna` NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_antenna(
    dev: *mut DeviceHandle,
    dir: c_int,
    antenna: *const c_char,
    chan: usize,
) -> ErrorCode {
    guard("rs_device_set_antenna", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("set_antenna", dir)?;
        let antenna = unsafe { c_str("set_antenna", antenna) }?;
        status(manager().device(dev).set_antenna(dir, antenna, chan))
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_antenna(
    dev: *mut DeviceHandle,
    dir: c_int,
    chan: usize,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_antenna", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_antenna", dir)?;
        let antenna = status(manager().device(dev).antenna(dir, chan))?;
        unsafe { write_str("get_antenna", &antenna, buffer, len) }
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_antennas(
    dev: *mut DeviceHandle,
    dir: c_int,
    chan: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_antennas", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_antennas", dir)?;
        let antennas = status(manager().device(dev).antennas(dir, chan))?;
        unsafe { write_list("get_antennas", &antennas, buffer, len, count) }
    })
}

/// # Safety
///
/// `dev` must be null or live.
#[no_mangle]
pub unsafe extern "C" fn rs_device_set_bandwidth(dev: *mut DeviceHandle, dir: c_int, bandwidth: f64, chan: usize) -> ErrorCode {
    guard("rs_device_set_bandwidth", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("set_bandwidth", dir)?;
        status(manager().device(dev).set_bandwidth(dir, bandwidth, chan))
    })
}

/// # Safety
///
/// `dev` must be null or live; `out` valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_bandwidth(dev: *mut DeviceHandle, dir: c_int, chan: usize, out: *mut f64) -> ErrorCode {
    guard("rs_device_get_bandwidth", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_bandwidth", dir)?;
        let out = unsafe { out_ptr("get_bandwidth", out) }?;
        *out = status(manager().device(dev).bandwidth(dir, chan))?;
        Ok(())
    })
}

/// Read one frontend sensor. See [`rs_device_get_mboard_sensor`].
///
/// # Safety
///
/// `dev` must be null or live; `name` NUL-terminated; `out` null or valid
/// for one write; `buffer` valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_sensor(
    dev: *mut DeviceHandle,
    dir: c_int,
    name: *const c_char,
    chan: usize,
    out: *mut RsSensorValue,
    buffer: *mut c_char,
    len: usize,
) -> ErrorCode {
    guard("rs_device_get_sensor", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_sensor", dir)?;
        let name = unsafe { c_str("get_sensor", name) }?;
        let value = status(manager().device(dev).sensor(dir, name, chan))?;
        unsafe { write_sensor("get_sensor", &value, out, buffer, len) }
    })
}

/// # Safety
///
/// `dev` must be null or live; `buffer` valid for `len` bytes; `count` null
/// or valid for one write.
#[no_mangle]
pub unsafe extern "C" fn rs_device_get_sensor_names(
    dev: *mut DeviceHandle,
    dir: c_int,
    chan: usize,
    buffer: *mut c_char,
    len: usize,
    count: *mut usize,
) -> ErrorCode {
    guard("rs_device_get_sensor_names", || {
        let dev = unsafe { device(dev) }?;
        let dir = direction("get_sensor_names", dir)?;
        let names = status(manager().device(dev).sensor_names(dir, chan))?;
        unsafe { write_list("get_sensor_names", &names, buffer, len, count) }
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};
    use std::ptr;

    use super::*;
    use crate::rs_get_last_error;
    use crate::types::{RS_DIR_RX, RS_DIR_TX, RS_SENSOR_BOOLEAN, RS_TUNE_POLICY_AUTO};

    fn make() -> *mut DeviceHandle {
        let args = CString::new("type=test").unwrap();
        let mut dev = ptr::null_mut();
        assert_eq!(unsafe { rs_device_make(&mut dev, args.as_ptr()) }, ErrorCode::None);
        assert!(!dev.is_null());
        dev
    }

    fn text(buf: &[c_char]) -> String {
        unsafe { CStr::from_ptr(buf.as_ptr()) }.to_str().unwrap().to_string()
    }

    #[test]
    fn free_nulls_pointer_and_second_free_is_invalid() {
        let mut dev = make();
        assert_eq!(unsafe { rs_device_free(&mut dev) }, ErrorCode::None);
        assert!(dev.is_null());
        assert_eq!(unsafe { rs_device_free(&mut dev) }, ErrorCode::InvalidDevice);
        assert_eq!(unsafe { rs_device_free(ptr::null_mut()) }, ErrorCode::Value);
    }

    #[test]
    fn null_device_is_invalid_everywhere() {
        let mut out = 0.0;
        let mut n = 0usize;
        let null = ptr::null_mut();
        assert_eq!(unsafe { rs_device_get_rate(null, RS_DIR_RX, 0, &mut out) }, ErrorCode::InvalidDevice);
        assert_eq!(unsafe { rs_device_get_num_mboards(null, &mut n) }, ErrorCode::InvalidDevice);
        assert_eq!(
            unsafe { rs_device_last_error(null, ptr::null_mut(), 0) },
            ErrorCode::InvalidDevice
        );
    }

    #[test]
    fn failed_make_leaves_null_and_thread_message() {
        let args = CString::new("type=test,fail=1").unwrap();
        let mut dev = ptr::NonNull::dangling().as_ptr();
        let code = unsafe { rs_device_make(&mut dev, args.as_ptr()) };
        assert_eq!(code, ErrorCode::DeviceConstructionFailed);
        assert!(dev.is_null());

        let mut buf = [0 as c_char; 64];
        unsafe { rs_get_last_error(buf.as_mut_ptr(), buf.len()) };
        assert_eq!(text(&buf), "make_device: device construction failed: device unreachable");
    }

    #[test]
    fn gain_and_antennas_through_c() {
        let mut dev = make();
        let pga = CString::new("PGA").unwrap();
        let mut gain = 0.0;
        assert_eq!(unsafe { rs_device_set_gain(dev, RS_DIR_RX, 40.0, 0, ptr::null()) }, ErrorCode::None);
        assert_eq!(unsafe { rs_device_get_gain(dev, RS_DIR_RX, 0, pga.as_ptr(), &mut gain) }, ErrorCode::None);
        assert_eq!(gain, 10.0);

        let mut buf = [0 as c_char; 32];
        let mut count = 0;
        let code = unsafe { rs_device_get_antennas(dev, RS_DIR_RX, 0, buf.as_mut_ptr(), buf.len(), &mut count) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!((text(&buf), count), ("TX/RX,RX2".to_string(), 2));

        let code = unsafe { rs_device_get_gain_names(dev, RS_DIR_TX, 0, buf.as_mut_ptr(), buf.len(), &mut count) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!((text(&buf), count), ("PGA,PA".to_string(), 2));

        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn handle_error_is_truncated_into_small_buffer() {
        let mut dev = make();
        let rx2 = CString::new("RX2").unwrap();
        let code = unsafe { rs_device_set_antenna(dev, RS_DIR_TX, rx2.as_ptr(), 0) };
        assert_eq!(code, ErrorCode::Value);

        let mut small = [0x7f as c_char; 8];
        assert_eq!(
            unsafe { rs_device_last_error(dev, small.as_mut_ptr(), small.len()) },
            ErrorCode::None
        );
        assert_eq!(text(&small), "set_tx_");
        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn stale_handle_reports_invalid_device_on_handle() {
        let mut dev = make();
        manager().free_device(unsafe { &*dev }).unwrap();

        let mut mcr = 0.0;
        assert_eq!(
            unsafe { rs_device_get_master_clock_rate(dev, 0, &mut mcr) },
            ErrorCode::InvalidDevice
        );
        let mut buf = [0 as c_char; 64];
        unsafe { rs_device_last_error(dev, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(text(&buf), "get_master_clock_rate: invalid device handle");

        // the box is still released and the pointer nulled
        assert_eq!(unsafe { rs_device_free(&mut dev) }, ErrorCode::InvalidDevice);
        assert!(dev.is_null());
    }

    #[test]
    fn tune_and_rate_through_c() {
        let mut dev = make();
        assert_eq!(unsafe { rs_device_set_rate(dev, RS_DIR_RX, 1e6, 0) }, ErrorCode::None);
        let mut rate = 0.0;
        assert_eq!(unsafe { rs_device_get_rate(dev, RS_DIR_RX, 0, &mut rate) }, ErrorCode::None);
        assert_eq!(rate, 1e6);

        let request = RsTuneRequest {
            target_freq: 915e6,
            rf_freq_policy: RS_TUNE_POLICY_AUTO,
            rf_freq: 0.0,
            dsp_freq_policy: RS_TUNE_POLICY_AUTO,
            dsp_freq: 0.0,
        };
        let mut result = RsTuneResult::default();
        assert_eq!(
            unsafe { rs_device_set_freq(dev, RS_DIR_RX, &request, 0, &mut result) },
            ErrorCode::None
        );
        assert_eq!(result.actual_rf_freq, 915e6);

        assert_eq!(unsafe { rs_device_set_rate(dev, 5, 1e6, 0) }, ErrorCode::Value);
        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn sensors_through_c() {
        let mut dev = make();
        let ref_locked = CString::new("ref_locked").unwrap();
        let mut value = RsSensorValue::default();
        let mut buf = [0 as c_char; 32];
        let code = unsafe {
            rs_device_get_mboard_sensor(dev, ref_locked.as_ptr(), 0, &mut value, buf.as_mut_ptr(), buf.len())
        };
        assert_eq!(code, ErrorCode::None);
        assert_eq!((value.data_type, value.as_bool), (RS_SENSOR_BOOLEAN, true));
        assert_eq!(text(&buf), "ref_locked: locked");

        let rssi = CString::new("rssi").unwrap();
        let code = unsafe { rs_device_get_sensor(dev, RS_DIR_RX, rssi.as_ptr(), 0, ptr::null_mut(), buf.as_mut_ptr(), buf.len()) };
        assert_eq!(code, ErrorCode::None);
        assert!(text(&buf).starts_with("rssi: "));

        let mut count = 0;
        let code = unsafe { rs_device_get_sensor_names(dev, RS_DIR_RX, 0, buf.as_mut_ptr(), buf.len(), &mut count) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!((text(&buf), count), ("lo_locked,rssi".to_string(), 2));

        let code = unsafe { rs_device_get_sensor(dev, RS_DIR_TX, rssi.as_ptr(), 0, ptr::null_mut(), ptr::null_mut(), 0) };
        assert_eq!(code, ErrorCode::Key);
        let mut msg = [0 as c_char; 128];
        unsafe { rs_device_last_error(dev, msg.as_mut_ptr(), msg.len()) };
        assert!(text(&msg).starts_with("get_tx_sensor: key error: no sensor named"));
        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn eeprom_fields_through_c() {
        let mut dev = make();
        let product = CString::new("product").unwrap();
        let revision = CString::new("revision").unwrap();
        let three = CString::new("3").unwrap();
        let mut buf = [0 as c_char; 32];

        let code = unsafe { rs_device_get_mboard_eeprom(dev, product.as_ptr(), 0, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!(text(&buf), "sim");

        assert_eq!(
            unsafe { rs_device_set_mboard_eeprom(dev, revision.as_ptr(), three.as_ptr(), 0) },
            ErrorCode::None
        );
        unsafe { rs_device_get_mboard_eeprom(dev, revision.as_ptr(), 0, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(text(&buf), "3");
        unsafe { rs_device_get_mboard_eeprom(dev, product.as_ptr(), 0, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(text(&buf), "sim");

        let missing = CString::new("nope").unwrap();
        let code = unsafe { rs_device_get_mboard_eeprom(dev, missing.as_ptr(), 0, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(code, ErrorCode::Key);
        let mut msg = [0 as c_char; 64];
        unsafe { rs_get_last_error(msg.as_mut_ptr(), msg.len()) };
        assert_eq!(text(&msg), "get_mboard_eeprom: key error: no eeprom field \"nope\"");

        let rx = CString::new("rx").unwrap();
        let id = CString::new("id").unwrap();
        let code = unsafe { rs_device_get_dboard_eeprom(dev, rx.as_ptr(), ptr::null(), id.as_ptr(), 0, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!(text(&buf), "0x0001");
        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn gpio_and_user_register_through_c() {
        let mut dev = make();
        let mut buf = [0 as c_char; 16];
        let mut count = 0;
        let code = unsafe { rs_device_get_gpio_banks(dev, 0, buf.as_mut_ptr(), buf.len(), &mut count) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!((text(&buf), count), ("FP0".to_string(), 1));

        let bank = CString::new("FP0").unwrap();
        let ddr = CString::new("DDR").unwrap();
        let out = CString::new("OUT").unwrap();
        let readback = CString::new("READBACK").unwrap();
        unsafe {
            assert_eq!(rs_device_set_gpio_attr(dev, bank.as_ptr(), ddr.as_ptr(), 0xff, 0xff, 0), ErrorCode::None);
            assert_eq!(rs_device_set_gpio_attr(dev, bank.as_ptr(), out.as_ptr(), 0xf0f, 0x0ff, 0), ErrorCode::None);
        }
        let mut value = 0u32;
        let code = unsafe { rs_device_get_gpio_attr(dev, bank.as_ptr(), readback.as_ptr(), 0, &mut value) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!(value, 0x00f);
        assert_eq!(
            unsafe { rs_device_set_gpio_attr(dev, bank.as_ptr(), readback.as_ptr(), 1, 1, 0) },
            ErrorCode::Value
        );

        assert_eq!(unsafe { rs_device_set_user_register(dev, 4, 0xdead, 0) }, ErrorCode::None);
        assert_eq!(unsafe { rs_device_set_user_register(dev, 4, 0xdead, 9) }, ErrorCode::Index);
        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn bandwidth_and_time_source_through_c() {
        let mut dev = make();
        let mut bw = 0.0;
        assert_eq!(unsafe { rs_device_set_bandwidth(dev, RS_DIR_RX, 10e6, 0) }, ErrorCode::None);
        assert_eq!(unsafe { rs_device_get_bandwidth(dev, RS_DIR_RX, 0, &mut bw) }, ErrorCode::None);
        assert_eq!(bw, 10e6);
        unsafe { rs_device_set_bandwidth(dev, RS_DIR_RX, 1e9, 0) };
        unsafe { rs_device_get_bandwidth(dev, RS_DIR_RX, 0, &mut bw) };
        assert_eq!(bw, 56e6);

        let gpsdo = CString::new("gpsdo").unwrap();
        let mut buf = [0 as c_char; 32];
        assert_eq!(unsafe { rs_device_set_time_source(dev, gpsdo.as_ptr(), 0) }, ErrorCode::None);
        unsafe { rs_device_get_time_source(dev, 0, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(text(&buf), "gpsdo");

        let mut count = 0;
        let code = unsafe { rs_device_get_time_sources(dev, 0, buf.as_mut_ptr(), buf.len(), &mut count) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!((text(&buf), count), ("internal,external,gpsdo".to_string(), 3));

        let bogus = CString::new("pps-in").unwrap();
        assert_eq!(unsafe { rs_device_set_time_source(dev, bogus.as_ptr(), 0) }, ErrorCode::Value);
        unsafe { rs_device_free(&mut dev) };
    }

    #[test]
    fn find_lists_sim_inventory() {
        let args = CString::new("type=test").unwrap();
        let mut buf = [0 as c_char; 128];
        let mut count = 0;
        let code = unsafe { rs_device_find(args.as_ptr(), buf.as_mut_ptr(), buf.len(), &mut count) };
        assert_eq!(code, ErrorCode::None);
        assert_eq!(count, 1);
        assert!(text(&buf).contains("serial=SIM0001"));
    }
}
