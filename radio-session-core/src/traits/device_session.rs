use std::sync::Arc;

use crate::models::error::BackendFault;
use crate::models::info::{ChannelInfo, EepromMap};
use crate::models::range::MetaRange;
use crate::models::sensor::SensorValue;
use crate::models::slot::Direction;
use crate::models::stream::{StreamArgs, StreamCommand};
use crate::models::time::TimeSpec;
use crate::models::tune::{TuneRequest, TuneResult};
use crate::traits::streamer::{RxStreamer, TxStreamer};

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendFault>;

/// A device session owned by the registry.
///
/// Frontend accessors take a [`Direction`] instead of being duplicated for
/// RX and TX. All methods take `&self`: the registry shares sessions behind
/// `Arc` and calls them from any thread, so implementations guard their own
/// state.
///
/// Accessors for optional hardware features (EEPROM, GPIO, user registers,
/// daughterboard EEPROM, AGC) default to a `NotImplemented` fault.
pub trait DeviceSession: Send + Sync {
    // --- streamers ---

    fn rx_stream(&self, args: &StreamArgs) -> BackendResult<Arc<dyn RxStreamer>>;

    fn tx_stream(&self, args: &StreamArgs) -> BackendResult<Arc<dyn TxStreamer>>;

    // --- identification ---

    fn channel_info(&self, dir: Direction, chan: usize) -> BackendResult<ChannelInfo>;

    /// Human-readable summary of the whole device.
    fn pp_string(&self) -> BackendResult<String>;

    fn mboard_name(&self, mboard: usize) -> BackendResult<String>;

    fn num_mboards(&self) -> BackendResult<usize>;

    // --- motherboard ---

    fn set_master_clock_rate(&self, rate: f64, mboard: usize) -> BackendResult<()>;

    fn master_clock_rate(&self, mboard: usize) -> BackendResult<f64>;

    fn time_now(&self, mboard: usize) -> BackendResult<TimeSpec>;

    fn time_last_pps(&self, mboard: usize) -> BackendResult<TimeSpec>;

    fn set_time_now(&self, time: TimeSpec, mboard: usize) -> BackendResult<()>;

    fn set_time_next_pps(&self, time: TimeSpec, mboard: usize) -> BackendResult<()>;

    /// Set the time on every mboard at an unknown PPS edge.
    fn set_time_unknown_pps(&self, time: TimeSpec) -> BackendResult<()>;

    fn time_synchronized(&self) -> BackendResult<bool>;

    fn set_command_time(&self, time: TimeSpec, mboard: usize) -> BackendResult<()>;

    fn clear_command_time(&self, mboard: usize) -> BackendResult<()>;

    /// Issue a stream command to the RX DSP of `chan`.
    fn issue_stream_cmd(&self, cmd: &StreamCommand, chan: usize) -> BackendResult<()>;

    fn set_time_source(&self, source: &str, mboard: usize) -> BackendResult<()>;

    fn time_source(&self, mboard: usize) -> BackendResult<String>;

    fn time_sources(&self, mboard: usize) -> BackendResult<Vec<String>>;

    fn set_clock_source(&self, source: &str, mboard: usize) -> BackendResult<()>;

    fn clock_source(&self, mboard: usize) -> BackendResult<String>;

    fn clock_sources(&self, mboard: usize) -> BackendResult<Vec<String>>;

    fn set_clock_source_out(&self, enable: bool, mboard: usize) -> BackendResult<()>;

    fn mboard_sensor(&self, name: &str, mboard: usize) -> BackendResult<SensorValue>;

    fn mboard_sensor_names(&self, mboard: usize) -> BackendResult<Vec<String>>;

    fn set_user_register(&self, addr: u8, data: u32, mboard: usize) -> BackendResult<()> {
        let _ = (addr, data, mboard);
        Err(BackendFault::not_implemented("user registers"))
    }

    fn mboard_eeprom(&self, mboard: usize) -> BackendResult<EepromMap> {
        let _ = mboard;
        Err(BackendFault::not_implemented("mboard eeprom"))
    }

    fn set_mboard_eeprom(&self, eeprom: &EepromMap, mboard: usize) -> BackendResult<()> {
        let _ = (eeprom, mboard);
        Err(BackendFault::not_implemented("mboard eeprom"))
    }

    fn dboard_eeprom(&self, unit: &str, slot: &str, mboard: usize) -> BackendResult<EepromMap> {
        let _ = (unit, slot, mboard);
        Err(BackendFault::not_implemented("dboard eeprom"))
    }

    fn set_dboard_eeprom(&self, eeprom: &EepromMap, unit: &str, slot: &str, mboard: usize) -> BackendResult<()> {
        let _ = (eeprom, unit, slot, mboard);
        Err(BackendFault::not_implemented("dboard eeprom"))
    }

    // --- frontends ---

    fn set_subdev_spec(&self, dir: Direction, spec: &str, mboard: usize) -> BackendResult<()>;

    fn subdev_spec(&self, dir: Direction, mboard: usize) -> BackendResult<String>;

    fn num_channels(&self, dir: Direction) -> BackendResult<usize>;

    fn subdev_name(&self, dir: Direction, chan: usize) -> BackendResult<String>;

    fn set_rate(&self, dir: Direction, rate: f64, chan: usize) -> BackendResult<()>;

    fn rate(&self, dir: Direction, chan: usize) -> BackendResult<f64>;

    fn rates(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange>;

    fn set_freq(&self, dir: Direction, request: &TuneRequest, chan: usize) -> BackendResult<TuneResult>;

    fn freq(&self, dir: Direction, chan: usize) -> BackendResult<f64>;

    fn freq_range(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange>;

    /// Tunable range of the RF frontend alone, without DSP offset.
    fn fe_freq_range(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange>;

    /// Set the overall gain, distributed across stages by the backend.
    fn set_gain(&self, dir: Direction, gain: f64, chan: usize) -> BackendResult<()>;

    /// Set the gain of one named stage.
    fn set_named_gain(&self, dir: Direction, gain: f64, name: &str, chan: usize) -> BackendResult<()>;

    fn gain(&self, dir: Direction, chan: usize) -> BackendResult<f64>;

    fn named_gain(&self, dir: Direction, name: &str, chan: usize) -> BackendResult<f64>;

    fn set_normalized_gain(&self, dir: Direction, gain: f64, chan: usize) -> BackendResult<()>;

    fn normalized_gain(&self, dir: Direction, chan: usize) -> BackendResult<f64>;

    /// Range of the named stage, or of the overall gain when `name` is `None`.
    fn gain_range(&self, dir: Direction, name: Option<&str>, chan: usize) -> BackendResult<MetaRange>;

    fn gain_names(&self, dir: Direction, chan: usize) -> BackendResult<Vec<String>>;

    fn set_rx_agc(&self, enable: bool, chan: usize) -> BackendResult<()> {
        let _ = (enable, chan);
        Err(BackendFault::not_implemented("rx agc"))
    }

    fn set_antenna(&self, dir: Direction, antenna: &str, chan: usize) -> BackendResult<()>;

    fn antenna(&self, dir: Direction, chan: usize) -> BackendResult<String>;

    fn antennas(&self, dir: Direction, chan: usize) -> BackendResult<Vec<String>>;

    fn set_bandwidth(&self, dir: Direction, bandwidth: f64, chan: usize) -> BackendResult<()>;

    fn bandwidth(&self, dir: Direction, chan: usize) -> BackendResult<f64>;

    fn bandwidth_range(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange>;

    fn sensor(&self, dir: Direction, name: &str, chan: usize) -> BackendResult<SensorValue>;

    fn sensor_names(&self, dir: Direction, chan: usize) -> BackendResult<Vec<String>>;

    fn set_dc_offset_enabled(&self, dir: Direction, enable: bool, chan: usize) -> BackendResult<()>;

    fn set_iq_balance_enabled(&self, dir: Direction, enable: bool, chan: usize) -> BackendResult<()>;

    // --- gpio ---

    fn gpio_banks(&self, mboard: usize) -> BackendResult<Vec<String>> {
        let _ = mboard;
        Err(BackendFault::not_implemented("gpio"))
    }

    fn set_gpio_attr(&self, bank: &str, attr: &str, value: u32, mask: u32, mboard: usize) -> BackendResult<()> {
        let _ = (bank, attr, value, mask, mboard);
        Err(BackendFault::not_implemented("gpio"))
    }

    fn gpio_attr(&self, bank: &str, attr: &str, mboard: usize) -> BackendResult<u32> {
        let _ = (bank, attr, mboard);
        Err(BackendFault::not_implemented("gpio"))
    }
}
