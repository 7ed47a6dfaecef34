use crate::handle::device_handle::DeviceHandle;
use crate::lifecycle::manager::HandleManager;
use crate::models::error::SessionError;
use crate::models::info::{ChannelInfo, EepromMap};
use crate::models::range::MetaRange;
use crate::models::sensor::SensorValue;
use crate::models::slot::Direction;
use crate::models::stream::StreamCommand;
use crate::models::time::TimeSpec;
use crate::models::tune::{TuneRequest, TuneResult};
use crate::traits::device_session::{BackendResult, DeviceSession};

type OpResult<T> = Result<T, SessionError>;

/// Forwarding view over one device handle.
///
/// Every method resolves the handle, calls the backend outside the registry
/// lock, and records a failure on the handle's last-error slot.
pub struct DeviceOps<'a> {
    manager: &'a HandleManager,
    handle: &'a DeviceHandle,
}

impl HandleManager {
    pub fn device<'a>(&'a self, handle: &'a DeviceHandle) -> DeviceOps<'a> {
        DeviceOps { manager: self, handle }
    }
}

fn dir_op(dir: Direction, name: &str) -> String {
    match name.split_once('_') {
        Some((verb, rest)) => format!("{}_{}_{}", verb, dir, rest),
        None => format!("{}_{}", name, dir),
    }
}

impl DeviceOps<'_> {
    fn call<T>(&self, op: &str, f: impl FnOnce(&(dyn DeviceSession + 'static)) -> BackendResult<T>) -> OpResult<T> {
        let resolved = self.manager.resolve_device(self.handle.index());
        self.manager.forward(self.handle.error_slot(), op, resolved, f)
    }

    pub fn handle(&self) -> &DeviceHandle {
        self.handle
    }

    // --- identification ---

    pub fn channel_info(&self, dir: Direction, chan: usize) -> OpResult<ChannelInfo> {
        self.call(&dir_op(dir, "get_info"), |s| s.channel_info(dir, chan))
    }

    pub fn pp_string(&self) -> OpResult<String> {
        self.call("get_pp_string", |s| s.pp_string())
    }

    pub fn mboard_name(&self, mboard: usize) -> OpResult<String> {
        self.call("get_mboard_name", |s| s.mboard_name(mboard))
    }

    pub fn num_mboards(&self) -> OpResult<usize> {
        self.call("get_num_mboards", |s| s.num_mboards())
    }

    // --- motherboard ---

    pub fn set_master_clock_rate(&self, rate: f64, mboard: usize) -> OpResult<()> {
        self.call("set_master_clock_rate", |s| s.set_master_clock_rate(rate, mboard))
    }

    pub fn master_clock_rate(&self, mboard: usize) -> OpResult<f64> {
        self.call("get_master_clock_rate", |s| s.master_clock_rate(mboard))
    }

    pub fn time_now(&self, mboard: usize) -> OpResult<TimeSpec> {
        self.call("get_time_now", |s| s.time_now(mboard))
    }

    pub fn time_last_pps(&self, mboard: usize) -> OpResult<TimeSpec> {
        self.call("get_time_last_pps", |s| s.time_last_pps(mboard))
    }

    pub fn set_time_now(&self, time: TimeSpec, mboard: usize) -> OpResult<()> {
        self.call("set_time_now", |s| s.set_time_now(time, mboard))
    }

    pub fn set_time_next_pps(&self, time: TimeSpec, mboard: usize) -> OpResult<()> {
        self.call("set_time_next_pps", |s| s.set_time_next_pps(time, mboard))
    }

    pub fn set_time_unknown_pps(&self, time: TimeSpec) -> OpResult<()> {
        self.call("set_time_unknown_pps", |s| s.set_time_unknown_pps(time))
    }

    pub fn time_synchronized(&self) -> OpResult<bool> {
        self.call("get_time_synchronized", |s| s.time_synchronized())
    }

    pub fn set_command_time(&self, time: TimeSpec, mboard: usize) -> OpResult<()> {
        self.call("set_command_time", |s| s.set_command_time(time, mboard))
    }

    pub fn clear_command_time(&self, mboard: usize) -> OpResult<()> {
        self.call("clear_command_time", |s| s.clear_command_time(mboard))
    }

    pub fn issue_stream_cmd(&self, cmd: &StreamCommand, chan: usize) -> OpResult<()> {
        self.call("issue_stream_cmd", |s| s.issue_stream_cmd(cmd, chan))
    }

    pub fn set_time_source(&self, source: &str, mboard: usize) -> OpResult<()> {
        self.call("set_time_source", |s| s.set_time_source(source, mboard))
    }

    pub fn time_source(&self, mboard: usize) -> OpResult<String> {
        self.call("get_time_source", |s| s.time_source(mboard))
    }

    pub fn time_sources(&self, mboard: usize) -> OpResult<Vec<String>> {
        self.call("get_time_sources", |s| s.time_sources(mboard))
    }

    pub fn set_clock_source(&self, source: &str, mboard: usize) -> OpResult<()> {
        self.call("set_clock_source", |s| s.set_clock_source(source, mboard))
    }

    pub fn clock_source(&self, mboard: usize) -> OpResult<String> {
        self.call("get_clock_source", |s| s.clock_source(mboard))
    }

    pub fn clock_sources(&self, mboard: usize) -> OpResult<Vec<String>> {
        self.call("get_clock_sources", |s| s.clock_sources(mboard))
    }

    pub fn set_clock_source_out(&self, enable: bool, mboard: usize) -> OpResult<()> {
        self.call("set_clock_source_out", |s| s.set_clock_source_out(enable, mboard))
    }

    pub fn mboard_sensor(&self, name: &str, mboard: usize) -> OpResult<SensorValue> {
        self.call("get_mboard_sensor", |s| s.mboard_sensor(name, mboard))
    }

    pub fn mboard_sensor_names(&self, mboard: usize) -> OpResult<Vec<String>> {
        self.call("get_mboard_sensor_names", |s| s.mboard_sensor_names(mboard))
    }

    pub fn set_user_register(&self, addr: u8, data: u32, mboard: usize) -> OpResult<()> {
        self.call("set_user_register", |s| s.set_user_register(addr, data, mboard))
    }

    pub fn mboard_eeprom(&self, mboard: usize) -> OpResult<EepromMap> {
        self.call("get_mboard_eeprom", |s| s.mboard_eeprom(mboard))
    }

    pub fn set_mboard_eeprom(&self, eeprom: &EepromMap, mboard: usize) -> OpResult<()> {
        self.call("set_mboard_eeprom", |s| s.set_mboard_eeprom(eeprom, mboard))
    }

    pub fn dboard_eeprom(&self, unit: &str, slot: &str, mboard: usize) -> OpResult<EepromMap> {
        self.call("get_dboard_eeprom", |s| s.dboard_eeprom(unit, slot, mboard))
    }

    pub fn set_dboard_eeprom(&self, eeprom: &EepromMap, unit: &str, slot: &str, mboard: usize) -> OpResult<()> {
        self.call("set_dboard_eeprom", |s| s.set_dboard_eeprom(eeprom, unit, slot, mboard))
    }

    // --- frontends ---

    pub fn set_subdev_spec(&self, dir: Direction, spec: &str, mboard: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_subdev_spec"), |s| s.set_subdev_spec(dir, spec, mboard))
    }

    pub fn subdev_spec(&self, dir: Direction, mboard: usize) -> OpResult<String> {
        self.call(&dir_op(dir, "get_subdev_spec"), |s| s.subdev_spec(dir, mboard))
    }

    pub fn num_channels(&self, dir: Direction) -> OpResult<usize> {
        self.call(&dir_op(dir, "get_num_channels"), |s| s.num_channels(dir))
    }

    pub fn subdev_name(&self, dir: Direction, chan: usize) -> OpResult<String> {
        self.call(&dir_op(dir, "get_subdev_name"), |s| s.subdev_name(dir, chan))
    }

    pub fn set_rate(&self, dir: Direction, rate: f64, chan: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_rate"), |s| s.set_rate(dir, rate, chan))
    }

    pub fn rate(&self, dir: Direction, chan: usize) -> OpResult<f64> {
        self.call(&dir_op(dir, "get_rate"), |s| s.rate(dir, chan))
    }

    pub fn rates(&self, dir: Direction, chan: usize) -> OpResult<MetaRange> {
        self.call(&dir_op(dir, "get_rates"), |s| s.rates(dir, chan))
    }

    pub fn set_freq(&self, dir: Direction, request: &TuneRequest, chan: usize) -> OpResult<TuneResult> {
        self.call(&dir_op(dir, "set_freq"), |s| s.set_freq(dir, request, chan))
    }

    pub fn freq(&self, dir: Direction, chan: usize) -> OpResult<f64> {
        self.call(&dir_op(dir, "get_freq"), |s| s.freq(dir, chan))
    }

    pub fn freq_range(&self, dir: Direction, chan: usize) -> OpResult<MetaRange> {
        self.call(&dir_op(dir, "get_freq_range"), |s| s.freq_range(dir, chan))
    }

    pub fn fe_freq_range(&self, dir: Direction, chan: usize) -> OpResult<MetaRange> {
        self.call(&dir_op(dir, "get_fe_freq_range"), |s| s.fe_freq_range(dir, chan))
    }

    /// Set a gain. An empty `name` sets the overall gain; any other name
    /// sets that stage only.
    pub fn set_gain(&self, dir: Direction, gain: f64, chan: usize, name: &str) -> OpResult<()> {
        self.call(&dir_op(dir, "set_gain"), |s| {
            if name.is_empty() {
                s.set_gain(dir, gain, chan)
            } else {
                s.set_named_gain(dir, gain, name, chan)
            }
        })
    }

    /// Read a gain. An empty `name` reads the overall gain.
    pub fn gain(&self, dir: Direction, chan: usize, name: &str) -> OpResult<f64> {
        self.call(&dir_op(dir, "get_gain"), |s| {
            if name.is_empty() {
                s.gain(dir, chan)
            } else {
                s.named_gain(dir, name, chan)
            }
        })
    }

    pub fn set_normalized_gain(&self, dir: Direction, gain: f64, chan: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_normalized_gain"), |s| s.set_normalized_gain(dir, gain, chan))
    }

    pub fn normalized_gain(&self, dir: Direction, chan: usize) -> OpResult<f64> {
        self.call(&dir_op(dir, "get_normalized_gain"), |s| s.normalized_gain(dir, chan))
    }

    /// Gain range of a stage, or of the overall gain when `name` is empty.
    pub fn gain_range(&self, dir: Direction, name: &str, chan: usize) -> OpResult<MetaRange> {
        let stage = (!name.is_empty()).then_some(name);
        self.call(&dir_op(dir, "get_gain_range"), |s| s.gain_range(dir, stage, chan))
    }

    pub fn gain_names(&self, dir: Direction, chan: usize) -> OpResult<Vec<String>> {
        self.call(&dir_op(dir, "get_gain_names"), |s| s.gain_names(dir, chan))
    }

    pub fn set_rx_agc(&self, enable: bool, chan: usize) -> OpResult<()> {
        self.call("set_rx_agc", |s| s.set_rx_agc(enable, chan))
    }

    pub fn set_antenna(&self, dir: Direction, antenna: &str, chan: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_antenna"), |s| s.set_antenna(dir, antenna, chan))
    }

    pub fn antenna(&self, dir: Direction, chan: usize) -> OpResult<String> {
        self.call(&dir_op(dir, "get_antenna"), |s| s.antenna(dir, chan))
    }

    pub fn antennas(&self, dir: Direction, chan: usize) -> OpResult<Vec<String>> {
        self.call(&dir_op(dir, "get_antennas"), |s| s.antennas(dir, chan))
    }

    pub fn set_bandwidth(&self, dir: Direction, bandwidth: f64, chan: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_bandwidth"), |s| s.set_bandwidth(dir, bandwidth, chan))
    }

    pub fn bandwidth(&self, dir: Direction, chan: usize) -> OpResult<f64> {
        self.call(&dir_op(dir, "get_bandwidth"), |s| s.bandwidth(dir, chan))
    }

    pub fn bandwidth_range(&self, dir: Direction, chan: usize) -> OpResult<MetaRange> {
        self.call(&dir_op(dir, "get_bandwidth_range"), |s| s.bandwidth_range(dir, chan))
    }

    pub fn sensor(&self, dir: Direction, name: &str, chan: usize) -> OpResult<SensorValue> {
        self.call(&dir_op(dir, "get_sensor"), |s| s.sensor(dir, name, chan))
    }

    pub fn sensor_names(&self, dir: Direction, chan: usize) -> OpResult<Vec<String>> {
        self.call(&dir_op(dir, "get_sensor_names"), |s| s.sensor_names(dir, chan))
    }

    pub fn set_dc_offset_enabled(&self, dir: Direction, enable: bool, chan: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_dc_offset_enabled"), |s| s.set_dc_offset_enabled(dir, enable, chan))
    }

    pub fn set_iq_balance_enabled(&self, dir: Direction, enable: bool, chan: usize) -> OpResult<()> {
        self.call(&dir_op(dir, "set_iq_balance_enabled"), |s| s.set_iq_balance_enabled(dir, enable, chan))
    }

    // --- gpio ---

    pub fn gpio_banks(&self, mboard: usize) -> OpResult<Vec<String>> {
        self.call("get_gpio_banks", |s| s.gpio_banks(mboard))
    }

    pub fn set_gpio_attr(&self, bank: &str, attr: &str, value: u32, mask: u32, mboard: usize) -> OpResult<()> {
        self.call("set_gpio_attr", |s| s.set_gpio_attr(bank, attr, value, mask, mboard))
    }

    pub fn gpio_attr(&self, bank: &str, attr: &str, mboard: usize) -> OpResult<u32> {
        self.call("get_gpio_attr", |s| s.gpio_attr(bank, attr, mboard))
    }
}
