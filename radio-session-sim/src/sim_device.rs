//! In-memory device session for the simulated backend.
//!
//! Holds motherboard and frontend state behind one `parking_lot::Mutex`
//! and loops TX samples back to RX through a shared [`Loopback`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use radio_session_core::models::error::BackendFault;
use radio_session_core::models::info::{ChannelInfo, EepromMap};
use radio_session_core::models::range::{MetaRange, Range};
use radio_session_core::models::sensor::SensorValue;
use radio_session_core::models::slot::Direction;
use radio_session_core::models::stream::{StreamArgs, StreamCommand};
use radio_session_core::models::time::TimeSpec;
use radio_session_core::models::tune::{TunePolicy, TuneRequest, TuneResult};
use radio_session_core::traits::device_session::{BackendResult, DeviceSession};
use radio_session_core::traits::streamer::{RxStreamer, TxStreamer};

use crate::args::{master_clock_range, SimConfig};
use crate::gain_stages::GainStages;
use crate::sim_streamer::{Loopback, SimRxStreamer, SimTxStreamer};

const FE_FREQ_MIN: f64 = 50e6;
const FE_FREQ_MAX: f64 = 6e9;
const BANDWIDTH_MIN: f64 = 200e3;
const BANDWIDTH_MAX: f64 = 56e6;
const MAX_DECIMATION: f64 = 512.0;

const TIME_SOURCES: &[&str] = &["internal", "external", "gpsdo"];
const CLOCK_SOURCES: &[&str] = &["internal", "external", "gpsdo"];
const RX_ANTENNAS: &[&str] = &["TX/RX", "RX2"];
const TX_ANTENNAS: &[&str] = &["TX/RX"];
const GPIO_BANKS: &[&str] = &["FP0"];
const GPIO_ATTRS: &[&str] = &["CTRL", "DDR", "OUT", "ATR_0X", "ATR_RX", "ATR_TX", "ATR_XX", "READBACK"];
const DBOARD_UNITS: &[&str] = &["rx", "tx"];

/// Free-running device clock.
#[derive(Debug, Clone)]
struct SimClock {
    epoch: Instant,
    offset: f64,
    last_pps: TimeSpec,
}

impl SimClock {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset: 0.0,
            last_pps: TimeSpec::default(),
        }
    }

    fn now(&self) -> TimeSpec {
        TimeSpec::from_secs(self.offset + self.epoch.elapsed().as_secs_f64())
    }

    fn set(&mut self, time: TimeSpec) {
        self.epoch = Instant::now();
        self.offset = time.as_secs();
    }
}

struct MboardState {
    master_clock_rate: f64,
    clock: SimClock,
    command_time: Option<TimeSpec>,
    time_source: String,
    clock_source: String,
    clock_source_out: bool,
    rx_subdev_spec: String,
    tx_subdev_spec: String,
    user_registers: BTreeMap<u8, u32>,
    eeprom: EepromMap,
    dboard_eeproms: BTreeMap<(String, String), EepromMap>,
    gpio: BTreeMap<(String, String), u32>,
}

struct FrontendState {
    decimation: f64,
    rf_freq: f64,
    dsp_freq: f64,
    gains: GainStages,
    antenna: String,
    bandwidth: f64,
    dc_offset_enabled: bool,
    iq_balance_enabled: bool,
    agc_enabled: bool,
}

impl FrontendState {
    fn new(dir: Direction) -> Self {
        let (gains, antenna) = match dir {
            Direction::Rx => (GainStages::rx(), "RX2"),
            Direction::Tx => (GainStages::tx(), "TX/RX"),
        };
        Self {
            decimation: 32.0,
            rf_freq: FE_FREQ_MIN,
            dsp_freq: 0.0,
            gains,
            antenna: antenna.into(),
            bandwidth: 20e6,
            dc_offset_enabled: true,
            iq_balance_enabled: true,
            agc_enabled: false,
        }
    }
}

struct DeviceState {
    mboards: Vec<MboardState>,
    rx: Vec<FrontendState>,
    tx: Vec<FrontendState>,
}

impl DeviceState {
    fn frontends(&mut self, dir: Direction) -> &mut Vec<FrontendState> {
        match dir {
            Direction::Rx => &mut self.rx,
            Direction::Tx => &mut self.tx,
        }
    }
}

#[derive(Serialize)]
struct DeviceSummary<'a> {
    device: &'static str,
    serial: &'a str,
    mboards: Vec<MboardSummary<'a>>,
    rx_channels: usize,
    tx_channels: usize,
}

#[derive(Serialize)]
struct MboardSummary<'a> {
    name: &'a str,
    master_clock_rate: f64,
    time_source: &'a str,
    clock_source: &'a str,
    clock_source_out: bool,
    rx_subdev_spec: &'a str,
    tx_subdev_spec: &'a str,
}

/// Correction and AGC switches of one frontend channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontendFlags {
    pub dc_offset: bool,
    pub iq_balance: bool,
    pub agc: bool,
}

/// A simulated multi-channel radio.
pub struct SimDevice {
    config: SimConfig,
    loopback: Arc<Loopback>,
    state: Mutex<DeviceState>,
}

impl SimDevice {
    /// Build a device from a validated configuration with a non-empty serial.
    pub fn new(config: SimConfig) -> Self {
        let mboards = (0..config.mboards)
            .map(|m| {
                let per_rx = channels_on(config.rx_channels, config.mboards, m);
                let per_tx = channels_on(config.tx_channels, config.mboards, m);
                let mut dboard_eeproms = BTreeMap::new();
                for unit in DBOARD_UNITS {
                    dboard_eeproms.insert(
                        (unit.to_string(), "A".to_string()),
                        EepromMap::from([
                            ("id".to_string(), "0x0001".to_string()),
                            ("serial".to_string(), format!("{}-{}{}", config.serial, unit, m)),
                        ]),
                    );
                }
                MboardState {
                    master_clock_rate: config.master_clock_rate,
                    clock: SimClock::new(),
                    command_time: None,
                    time_source: "internal".into(),
                    clock_source: "internal".into(),
                    clock_source_out: false,
                    rx_subdev_spec: default_subdev_spec(per_rx),
                    tx_subdev_spec: default_subdev_spec(per_tx),
                    user_registers: BTreeMap::new(),
                    eeprom: EepromMap::from([
                        ("name".to_string(), config.name.clone()),
                        ("serial".to_string(), config.serial.clone()),
                        ("product".to_string(), "sim".to_string()),
                    ]),
                    dboard_eeproms,
                    gpio: BTreeMap::new(),
                }
            })
            .collect();

        let state = DeviceState {
            mboards,
            rx: (0..config.rx_channels).map(|_| FrontendState::new(Direction::Rx)).collect(),
            tx: (0..config.tx_channels).map(|_| FrontendState::new(Direction::Tx)).collect(),
        };
        Self {
            loopback: Arc::new(Loopback::new(config.rx_channels)),
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Last value written to a user register, if any.
    pub fn user_register(&self, addr: u8, mboard: usize) -> BackendResult<Option<u32>> {
        self.with_mboard(mboard, |mb| Ok(mb.user_registers.get(&addr).copied()))
    }

    /// Pending command time of an mboard, if any.
    pub fn command_time(&self, mboard: usize) -> BackendResult<Option<TimeSpec>> {
        self.with_mboard(mboard, |mb| Ok(mb.command_time))
    }

    pub fn frontend_flags(&self, dir: Direction, chan: usize) -> BackendResult<FrontendFlags> {
        self.with_frontend(dir, chan, |fe, _| {
            Ok(FrontendFlags {
                dc_offset: fe.dc_offset_enabled,
                iq_balance: fe.iq_balance_enabled,
                agc: fe.agc_enabled,
            })
        })
    }

    fn channel_count(&self, dir: Direction) -> usize {
        match dir {
            Direction::Rx => self.config.rx_channels,
            Direction::Tx => self.config.tx_channels,
        }
    }

    fn mboard_of(&self, dir: Direction, chan: usize) -> usize {
        let per = self.channel_count(dir).div_ceil(self.config.mboards).max(1);
        (chan / per).min(self.config.mboards - 1)
    }

    fn with_mboard<T>(&self, mboard: usize, f: impl FnOnce(&mut MboardState) -> BackendResult<T>) -> BackendResult<T> {
        let mut state = self.state.lock();
        let count = state.mboards.len();
        let mb = state
            .mboards
            .get_mut(mboard)
            .ok_or_else(|| BackendFault::index(format!("mboard {} out of range ({} available)", mboard, count)))?;
        f(mb)
    }

    /// Run `f` on a frontend channel together with the master clock rate of
    /// the mboard it lives on.
    fn with_frontend<T>(
        &self,
        dir: Direction,
        chan: usize,
        f: impl FnOnce(&mut FrontendState, f64) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mboard = self.mboard_of(dir, chan);
        let mut state = self.state.lock();
        let mcr = state.mboards[mboard].master_clock_rate;
        let frontends = state.frontends(dir);
        let count = frontends.len();
        let fe = frontends
            .get_mut(chan)
            .ok_or_else(|| BackendFault::index(format!("{} channel {} out of range ({} available)", dir, chan, count)))?;
        f(fe, mcr)
    }
}

impl DeviceSession for SimDevice {
    fn rx_stream(&self, args: &StreamArgs) -> BackendResult<Arc<dyn RxStreamer>> {
        Ok(Arc::new(SimRxStreamer::new(Arc::clone(&self.loopback), args)?))
    }

    fn tx_stream(&self, args: &StreamArgs) -> BackendResult<Arc<dyn TxStreamer>> {
        Ok(Arc::new(SimTxStreamer::new(
            Arc::clone(&self.loopback),
            args,
            self.config.tx_channels,
        )?))
    }

    fn channel_info(&self, dir: Direction, chan: usize) -> BackendResult<ChannelInfo> {
        let mboard = self.mboard_of(dir, chan);
        let antenna = self.antenna(dir, chan)?;
        let subdev_spec = self.subdev_spec(dir, mboard)?;
        Ok(ChannelInfo {
            mboard_id: "SIM".into(),
            mboard_serial: self.config.serial.clone(),
            subdev_id: "0x0001".into(),
            subdev_name: self.subdev_name(dir, chan)?,
            subdev_spec,
            serial: format!("{}-{}{}", self.config.serial, dir, chan),
            antenna,
        })
    }

    fn pp_string(&self) -> BackendResult<String> {
        let state = self.state.lock();
        let summary = DeviceSummary {
            device: "simulated radio",
            serial: &self.config.serial,
            mboards: state
                .mboards
                .iter()
                .map(|mb| MboardSummary {
                    name: &self.config.name,
                    master_clock_rate: mb.master_clock_rate,
                    time_source: &mb.time_source,
                    clock_source: &mb.clock_source,
                    clock_source_out: mb.clock_source_out,
                    rx_subdev_spec: &mb.rx_subdev_spec,
                    tx_subdev_spec: &mb.tx_subdev_spec,
                })
                .collect(),
            rx_channels: self.config.rx_channels,
            tx_channels: self.config.tx_channels,
        };
        serde_json::to_string_pretty(&summary)
            .map_err(|e| BackendFault::runtime(format!("failed to render device summary: {}", e)))
    }

    fn mboard_name(&self, mboard: usize) -> BackendResult<String> {
        self.with_mboard(mboard, |_| Ok(self.config.name.clone()))
    }

    fn num_mboards(&self) -> BackendResult<usize> {
        Ok(self.config.mboards)
    }

    fn set_master_clock_rate(&self, rate: f64, mboard: usize) -> BackendResult<()> {
        let (min, max) = master_clock_range();
        if !(min..=max).contains(&rate) {
            return Err(BackendFault::value(format!(
                "master clock rate {} Hz outside {} to {} Hz",
                rate, min, max
            )));
        }
        self.with_mboard(mboard, |mb| {
            mb.master_clock_rate = rate;
            Ok(())
        })
    }

    fn master_clock_rate(&self, mboard: usize) -> BackendResult<f64> {
        self.with_mboard(mboard, |mb| Ok(mb.master_clock_rate))
    }

    fn time_now(&self, mboard: usize) -> BackendResult<TimeSpec> {
        self.with_mboard(mboard, |mb| Ok(mb.clock.now()))
    }

    fn time_last_pps(&self, mboard: usize) -> BackendResult<TimeSpec> {
        self.with_mboard(mboard, |mb| Ok(mb.clock.last_pps))
    }

    fn set_time_now(&self, time: TimeSpec, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.clock.set(time);
            Ok(())
        })
    }

    /// There is no PPS input; the edge is taken to occur immediately.
    fn set_time_next_pps(&self, time: TimeSpec, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.clock.set(time);
            mb.clock.last_pps = time;
            Ok(())
        })
    }

    fn set_time_unknown_pps(&self, time: TimeSpec) -> BackendResult<()> {
        let mut state = self.state.lock();
        for mb in &mut state.mboards {
            mb.clock.set(time);
            mb.clock.last_pps = time;
        }
        Ok(())
    }

    fn time_synchronized(&self) -> BackendResult<bool> {
        let state = self.state.lock();
        let times: Vec<f64> = state.mboards.iter().map(|mb| mb.clock.now().as_secs()).collect();
        let first = times.first().copied().unwrap_or_default();
        Ok(times.iter().all(|t| (t - first).abs() < 1e-3))
    }

    fn set_command_time(&self, time: TimeSpec, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.command_time = Some(time);
            Ok(())
        })
    }

    fn clear_command_time(&self, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.command_time = None;
            Ok(())
        })
    }

    fn issue_stream_cmd(&self, cmd: &StreamCommand, chan: usize) -> BackendResult<()> {
        self.loopback.issue_stream_cmd(cmd, chan)
    }

    fn set_time_source(&self, source: &str, mboard: usize) -> BackendResult<()> {
        check_choice("time source", source, TIME_SOURCES)?;
        self.with_mboard(mboard, |mb| {
            mb.time_source = source.into();
            Ok(())
        })
    }

    fn time_source(&self, mboard: usize) -> BackendResult<String> {
        self.with_mboard(mboard, |mb| Ok(mb.time_source.clone()))
    }

    fn time_sources(&self, mboard: usize) -> BackendResult<Vec<String>> {
        self.with_mboard(mboard, |_| Ok(to_strings(TIME_SOURCES)))
    }

    fn set_clock_source(&self, source: &str, mboard: usize) -> BackendResult<()> {
        check_choice("clock source", source, CLOCK_SOURCES)?;
        self.with_mboard(mboard, |mb| {
            mb.clock_source = source.into();
            Ok(())
        })
    }

    fn clock_source(&self, mboard: usize) -> BackendResult<String> {
        self.with_mboard(mboard, |mb| Ok(mb.clock_source.clone()))
    }

    fn clock_sources(&self, mboard: usize) -> BackendResult<Vec<String>> {
        self.with_mboard(mboard, |_| Ok(to_strings(CLOCK_SOURCES)))
    }

    fn set_clock_source_out(&self, enable: bool, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.clock_source_out = enable;
            Ok(())
        })
    }

    fn mboard_sensor(&self, name: &str, mboard: usize) -> BackendResult<SensorValue> {
        self.with_mboard(mboard, |mb| match name {
            // nothing is wired to the reference inputs
            "ref_locked" => Ok(SensorValue::boolean(
                name,
                mb.clock_source == "internal",
                "locked",
                "unlocked",
            )),
            "temp" => Ok(SensorValue::real(name, 42.0, "C")),
            other => Err(BackendFault::key(format!("no mboard sensor named \"{}\"", other))),
        })
    }

    fn mboard_sensor_names(&self, mboard: usize) -> BackendResult<Vec<String>> {
        self.with_mboard(mboard, |_| Ok(to_strings(&["ref_locked", "temp"])))
    }

    fn set_user_register(&self, addr: u8, data: u32, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.user_registers.insert(addr, data);
            Ok(())
        })
    }

    fn mboard_eeprom(&self, mboard: usize) -> BackendResult<EepromMap> {
        self.with_mboard(mboard, |mb| Ok(mb.eeprom.clone()))
    }

    fn set_mboard_eeprom(&self, eeprom: &EepromMap, mboard: usize) -> BackendResult<()> {
        self.with_mboard(mboard, |mb| {
            mb.eeprom.extend(eeprom.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    fn dboard_eeprom(&self, unit: &str, slot: &str, mboard: usize) -> BackendResult<EepromMap> {
        let key = dboard_key(unit, slot)?;
        self.with_mboard(mboard, |mb| Ok(mb.dboard_eeproms.get(&key).cloned().unwrap_or_default()))
    }

    fn set_dboard_eeprom(&self, eeprom: &EepromMap, unit: &str, slot: &str, mboard: usize) -> BackendResult<()> {
        let key = dboard_key(unit, slot)?;
        self.with_mboard(mboard, |mb| {
            mb.dboard_eeproms
                .entry(key)
                .or_default()
                .extend(eeprom.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        })
    }

    fn set_subdev_spec(&self, dir: Direction, spec: &str, mboard: usize) -> BackendResult<()> {
        let valid = !spec.trim().is_empty()
            && spec.split_whitespace().all(|token| {
                token
                    .split_once(':')
                    .is_some_and(|(db, sd)| !db.is_empty() && !sd.is_empty())
            });
        if !valid {
            return Err(BackendFault::value(format!("malformed subdev spec \"{}\"", spec)));
        }
        self.with_mboard(mboard, |mb| {
            match dir {
                Direction::Rx => mb.rx_subdev_spec = spec.into(),
                Direction::Tx => mb.tx_subdev_spec = spec.into(),
            }
            Ok(())
        })
    }

    fn subdev_spec(&self, dir: Direction, mboard: usize) -> BackendResult<String> {
        self.with_mboard(mboard, |mb| {
            Ok(match dir {
                Direction::Rx => mb.rx_subdev_spec.clone(),
                Direction::Tx => mb.tx_subdev_spec.clone(),
            })
        })
    }

    fn num_channels(&self, dir: Direction) -> BackendResult<usize> {
        Ok(self.channel_count(dir))
    }

    fn subdev_name(&self, dir: Direction, chan: usize) -> BackendResult<String> {
        self.with_frontend(dir, chan, |_, _| Ok(format!("SIM {}", dir.to_string().to_uppercase())))
    }

    /// Coerced to the nearest `master_clock_rate / decimation`.
    fn set_rate(&self, dir: Direction, rate: f64, chan: usize) -> BackendResult<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(BackendFault::value(format!("sample rate {} must be positive", rate)));
        }
        self.with_frontend(dir, chan, |fe, mcr| {
            fe.decimation = (mcr / rate).round().clamp(1.0, MAX_DECIMATION);
            let actual = mcr / fe.decimation;
            if (actual - rate).abs() > 1.0 {
                log::debug!("{} rate {} coerced to {} on channel {}", dir, rate, actual, chan);
            }
            Ok(())
        })
    }

    fn rate(&self, dir: Direction, chan: usize) -> BackendResult<f64> {
        self.with_frontend(dir, chan, |fe, mcr| Ok(mcr / fe.decimation))
    }

    fn rates(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange> {
        self.with_frontend(dir, chan, |_, mcr| Ok(MetaRange::new([Range::new(mcr / MAX_DECIMATION, mcr, 0.0)])))
    }

    fn set_freq(&self, dir: Direction, request: &TuneRequest, chan: usize) -> BackendResult<TuneResult> {
        let fe_range = MetaRange::new([Range::new(FE_FREQ_MIN, FE_FREQ_MAX, 0.0)]);
        let clip = |f: f64| fe_range.clip(f, false).unwrap_or(FE_FREQ_MIN);
        self.with_frontend(dir, chan, |fe, mcr| {
            let clipped_rf_freq = clip(request.target_freq);
            let target_rf_freq = match request.rf_freq_policy {
                TunePolicy::Auto => clipped_rf_freq,
                TunePolicy::Manual => request.rf_freq,
                TunePolicy::None => fe.rf_freq,
            };
            let actual_rf_freq = clip(target_rf_freq);
            let target_dsp_freq = match request.dsp_freq_policy {
                TunePolicy::Auto => request.target_freq - actual_rf_freq,
                TunePolicy::Manual => request.dsp_freq,
                TunePolicy::None => fe.dsp_freq,
            };
            let actual_dsp_freq = target_dsp_freq.clamp(-mcr / 2.0, mcr / 2.0);

            fe.rf_freq = actual_rf_freq;
            fe.dsp_freq = actual_dsp_freq;
            Ok(TuneResult {
                clipped_rf_freq,
                target_rf_freq,
                actual_rf_freq,
                target_dsp_freq,
                actual_dsp_freq,
            })
        })
    }

    fn freq(&self, dir: Direction, chan: usize) -> BackendResult<f64> {
        self.with_frontend(dir, chan, |fe, _| Ok(fe.rf_freq + fe.dsp_freq))
    }

    fn freq_range(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange> {
        self.with_frontend(dir, chan, |_, mcr| {
            Ok(MetaRange::new([Range::new(FE_FREQ_MIN - mcr / 2.0, FE_FREQ_MAX + mcr / 2.0, 0.0)]))
        })
    }

    fn fe_freq_range(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange> {
        self.with_frontend(dir, chan, |_, _| Ok(MetaRange::new([Range::new(FE_FREQ_MIN, FE_FREQ_MAX, 0.0)])))
    }

    fn set_gain(&self, dir: Direction, gain: f64, chan: usize) -> BackendResult<()> {
        self.with_frontend(dir, chan, |fe, _| {
            fe.gains.set_total(gain);
            Ok(())
        })
    }

    fn set_named_gain(&self, dir: Direction, gain: f64, name: &str, chan: usize) -> BackendResult<()> {
        self.with_frontend(dir, chan, |fe, _| fe.gains.set_stage(name, gain).map(|_| ()))
    }

    fn gain(&self, dir: Direction, chan: usize) -> BackendResult<f64> {
        self.with_frontend(dir, chan, |fe, _| Ok(fe.gains.total()))
    }

    fn named_gain(&self, dir: Direction, name: &str, chan: usize) -> BackendResult<f64> {
        self.with_frontend(dir, chan, |fe, _| fe.gains.stage(name))
    }

    fn set_normalized_gain(&self, dir: Direction, gain: f64, chan: usize) -> BackendResult<()> {
        self.with_frontend(dir, chan, |fe, _| fe.gains.set_normalized(gain).map(|_| ()))
    }

    fn normalized_gain(&self, dir: Direction, chan: usize) -> BackendResult<f64> {
        self.with_frontend(dir, chan, |fe, _| Ok(fe.gains.normalized()))
    }

    fn gain_range(&self, dir: Direction, name: Option<&str>, chan: usize) -> BackendResult<MetaRange> {
        self.with_frontend(dir, chan, |fe, _| match name {
            Some(name) => fe.gains.stage_range(name),
            None => Ok(fe.gains.total_range()),
        })
    }

    fn gain_names(&self, dir: Direction, chan: usize) -> BackendResult<Vec<String>> {
        self.with_frontend(dir, chan, |fe, _| Ok(fe.gains.names()))
    }

    fn set_rx_agc(&self, enable: bool, chan: usize) -> BackendResult<()> {
        self.with_frontend(Direction::Rx, chan, |fe, _| {
            fe.agc_enabled = enable;
            Ok(())
        })
    }

    fn set_antenna(&self, dir: Direction, antenna: &str, chan: usize) -> BackendResult<()> {
        let choices = antennas_for(dir);
        if !choices.contains(&antenna) {
            return Err(BackendFault::value(format!(
                "antenna \"{}\" not available on {} channel {} (choices: {})",
                antenna,
                dir,
                chan,
                choices.join(", ")
            )));
        }
        self.with_frontend(dir, chan, |fe, _| {
            fe.antenna = antenna.into();
            Ok(())
        })
    }

    fn antenna(&self, dir: Direction, chan: usize) -> BackendResult<String> {
        self.with_frontend(dir, chan, |fe, _| Ok(fe.antenna.clone()))
    }

    fn antennas(&self, dir: Direction, chan: usize) -> BackendResult<Vec<String>> {
        self.with_frontend(dir, chan, |_, _| Ok(to_strings(antennas_for(dir))))
    }

    fn set_bandwidth(&self, dir: Direction, bandwidth: f64, chan: usize) -> BackendResult<()> {
        self.with_frontend(dir, chan, |fe, _| {
            fe.bandwidth = bandwidth.clamp(BANDWIDTH_MIN, BANDWIDTH_MAX);
            Ok(())
        })
    }

    fn bandwidth(&self, dir: Direction, chan: usize) -> BackendResult<f64> {
        self.with_frontend(dir, chan, |fe, _| Ok(fe.bandwidth))
    }

    fn bandwidth_range(&self, dir: Direction, chan: usize) -> BackendResult<MetaRange> {
        self.with_frontend(dir, chan, |_, _| Ok(MetaRange::new([Range::new(BANDWIDTH_MIN, BANDWIDTH_MAX, 0.0)])))
    }

    fn sensor(&self, dir: Direction, name: &str, chan: usize) -> BackendResult<SensorValue> {
        self.with_frontend(dir, chan, |fe, _| match (dir, name) {
            (_, "lo_locked") => Ok(SensorValue::boolean(name, true, "locked", "unlocked")),
            (Direction::Rx, "rssi") => Ok(SensorValue::real(name, -100.0 + fe.gains.total(), "dBm")),
            _ => Err(BackendFault::key(format!(
                "no sensor named \"{}\" on {} channel {}",
                name, dir, chan
            ))),
        })
    }

    fn sensor_names(&self, dir: Direction, chan: usize) -> BackendResult<Vec<String>> {
        self.with_frontend(dir, chan, |_, _| {
            Ok(match dir {
                Direction::Rx => to_strings(&["lo_locked", "rssi"]),
                Direction::Tx => to_strings(&["lo_locked"]),
            })
        })
    }

    fn set_dc_offset_enabled(&self, dir: Direction, enable: bool, chan: usize) -> BackendResult<()> {
        self.with_frontend(dir, chan, |fe, _| {
            fe.dc_offset_enabled = enable;
            Ok(())
        })
    }

    fn set_iq_balance_enabled(&self, dir: Direction, enable: bool, chan: usize) -> BackendResult<()> {
        self.with_frontend(dir, chan, |fe, _| {
            fe.iq_balance_enabled = enable;
            Ok(())
        })
    }

    fn gpio_banks(&self, mboard: usize) -> BackendResult<Vec<String>> {
        self.with_mboard(mboard, |_| Ok(to_strings(GPIO_BANKS)))
    }

    fn set_gpio_attr(&self, bank: &str, attr: &str, value: u32, mask: u32, mboard: usize) -> BackendResult<()> {
        check_gpio(bank, attr)?;
        if attr == "READBACK" {
            return Err(BackendFault::value("gpio attribute READBACK is read-only"));
        }
        self.with_mboard(mboard, |mb| {
            let reg = mb.gpio.entry((bank.to_string(), attr.to_string())).or_default();
            *reg = (*reg & !mask) | (value & mask);
            Ok(())
        })
    }

    fn gpio_attr(&self, bank: &str, attr: &str, mboard: usize) -> BackendResult<u32> {
        check_gpio(bank, attr)?;
        self.with_mboard(mboard, |mb| {
            let read = |a: &str| mb.gpio.get(&(bank.to_string(), a.to_string())).copied().unwrap_or(0);
            Ok(if attr == "READBACK" {
                read("OUT") & read("DDR")
            } else {
                read(attr)
            })
        })
    }
}

fn channels_on(total: usize, mboards: usize, mboard: usize) -> usize {
    let per = total.div_ceil(mboards).max(1);
    total.saturating_sub(per * mboard).min(per)
}

fn default_subdev_spec(channels: usize) -> String {
    (0..channels.max(1))
        .map(|c| format!("A:{}", c))
        .collect::<Vec<_>>()
        .join(" ")
}

fn antennas_for(dir: Direction) -> &'static [&'static str] {
    match dir {
        Direction::Rx => RX_ANTENNAS,
        Direction::Tx => TX_ANTENNAS,
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn check_choice(what: &str, value: &str, choices: &[&str]) -> BackendResult<()> {
    if choices.contains(&value) {
        Ok(())
    } else {
        Err(BackendFault::value(format!("unsupported {} \"{}\"", what, value)))
    }
}

fn check_gpio(bank: &str, attr: &str) -> BackendResult<()> {
    if !GPIO_BANKS.contains(&bank) {
        return Err(BackendFault::key(format!("no gpio bank named \"{}\"", bank)));
    }
    if !GPIO_ATTRS.contains(&attr) {
        return Err(BackendFault::key(format!("no gpio attribute named \"{}\"", attr)));
    }
    Ok(())
}

fn dboard_key(unit: &str, slot: &str) -> BackendResult<(String, String)> {
    if !DBOARD_UNITS.contains(&unit) {
        return Err(BackendFault::key(format!("no dboard unit named \"{}\"", unit)));
    }
    let slot = if slot.is_empty() { "A" } else { slot };
    if slot != "A" {
        return Err(BackendFault::key(format!("no dboard in slot \"{}\"", slot)));
    }
    Ok((unit.to_string(), slot.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use radio_session_core::FaultKind;

    fn device() -> SimDevice {
        SimDevice::new(SimConfig {
            serial: "S1".into(),
            ..SimConfig::default()
        })
    }

    #[test]
    fn rate_is_coerced_to_decimation() {
        let dev = device();
        dev.set_rate(Direction::Rx, 3e6, 0).unwrap();
        // 32 MHz / round(10.67) = 2.909 MHz
        assert_relative_eq!(dev.rate(Direction::Rx, 0).unwrap(), 32e6 / 11.0);

        dev.set_master_clock_rate(16e6, 0).unwrap();
        assert_relative_eq!(dev.rate(Direction::Rx, 0).unwrap(), 16e6 / 11.0);
        assert!(dev.set_rate(Direction::Rx, -1.0, 0).is_err());
    }

    #[test]
    fn tune_splits_rf_and_dsp() {
        let dev = device();
        let result = dev.set_freq(Direction::Rx, &TuneRequest::with_lo_offset(915e6, 2e6), 0).unwrap();
        assert_relative_eq!(result.actual_rf_freq, 917e6);
        assert_relative_eq!(result.actual_dsp_freq, -2e6);
        assert_relative_eq!(dev.freq(Direction::Rx, 0).unwrap(), 915e6);

        let result = dev.set_freq(Direction::Tx, &TuneRequest::new(10e6), 1).unwrap();
        assert_relative_eq!(result.clipped_rf_freq, FE_FREQ_MIN);
        assert_relative_eq!(result.actual_dsp_freq, -16e6);
    }

    #[test]
    fn antenna_must_be_listed() {
        let dev = device();
        dev.set_antenna(Direction::Rx, "TX/RX", 1).unwrap();
        assert_eq!(dev.antenna(Direction::Rx, 1).unwrap(), "TX/RX");
        assert_eq!(dev.antenna(Direction::Rx, 0).unwrap(), "RX2");

        let err = dev.set_antenna(Direction::Tx, "RX2", 0).unwrap_err();
        assert_eq!(err.kind, FaultKind::Value);
    }

    #[test]
    fn channel_and_mboard_bounds_are_index_faults() {
        let dev = device();
        assert_eq!(dev.gain(Direction::Rx, 2).unwrap_err().kind, FaultKind::Index);
        assert_eq!(dev.mboard_name(1).unwrap_err().kind, FaultKind::Index);
    }

    #[test]
    fn gpio_masks_writes() {
        let dev = device();
        dev.set_gpio_attr("FP0", "DDR", 0xff, 0xff, 0).unwrap();
        dev.set_gpio_attr("FP0", "OUT", 0xf0f, 0x0ff, 0).unwrap();
        assert_eq!(dev.gpio_attr("FP0", "OUT", 0).unwrap(), 0x00f);
        assert_eq!(dev.gpio_attr("FP0", "READBACK", 0).unwrap(), 0x00f);
        assert_eq!(dev.set_gpio_attr("FP1", "OUT", 1, 1, 0).unwrap_err().kind, FaultKind::Key);
    }

    #[test]
    fn eeprom_updates_merge() {
        let dev = device();
        let update = EepromMap::from([("revision".to_string(), "3".to_string())]);
        dev.set_mboard_eeprom(&update, 0).unwrap();
        let eeprom = dev.mboard_eeprom(0).unwrap();
        assert_eq!(eeprom.get("serial").map(String::as_str), Some("S1"));
        assert_eq!(eeprom.get("revision").map(String::as_str), Some("3"));

        assert_eq!(
            dev.dboard_eeprom("rx", "", 0).unwrap().get("serial").map(String::as_str),
            Some("S1-rx0")
        );
        assert!(dev.dboard_eeprom("gdb", "A", 0).is_err());
    }

    #[test]
    fn ref_lock_follows_clock_source() {
        let dev = device();
        assert_eq!(dev.mboard_sensor("ref_locked", 0).unwrap().unit, "locked");
        dev.set_clock_source("external", 0).unwrap();
        assert_eq!(dev.mboard_sensor("ref_locked", 0).unwrap().unit, "unlocked");
        assert!(dev.set_clock_source("mimo", 0).is_err());
    }

    #[test]
    fn pp_string_is_json() {
        let dev = device();
        let parsed: serde_json::Value = serde_json::from_str(&dev.pp_string().unwrap()).unwrap();
        assert_eq!(parsed["serial"], "S1");
        assert_eq!(parsed["mboards"][0]["rx_subdev_spec"], "A:0 A:1");
    }

    #[test]
    fn channels_split_across_mboards() {
        let dev = SimDevice::new(SimConfig {
            serial: "S2".into(),
            mboards: 2,
            rx_channels: 3,
            ..SimConfig::default()
        });
        assert_eq!(dev.subdev_spec(Direction::Rx, 0).unwrap(), "A:0 A:1");
        assert_eq!(dev.subdev_spec(Direction::Rx, 1).unwrap(), "A:0");
        dev.set_master_clock_rate(16e6, 1).unwrap();
        assert_relative_eq!(dev.rate(Direction::Rx, 2).unwrap(), 16e6 / 32.0);
        assert_relative_eq!(dev.rate(Direction::Rx, 0).unwrap(), 32e6 / 32.0);
    }

    #[test]
    fn user_registers_and_command_time_are_kept() {
        let dev = device();
        dev.set_user_register(7, 0xdead, 0).unwrap();
        assert_eq!(dev.user_register(7, 0).unwrap(), Some(0xdead));

        dev.set_command_time(TimeSpec::new(5, 0.0), 0).unwrap();
        assert_eq!(dev.command_time(0).unwrap(), Some(TimeSpec::new(5, 0.0)));
        dev.clear_command_time(0).unwrap();
        assert_eq!(dev.command_time(0).unwrap(), None);
    }

    #[test]
    fn frontend_switches_are_per_channel() {
        let dev = device();
        dev.set_rx_agc(true, 1).unwrap();
        dev.set_dc_offset_enabled(Direction::Rx, false, 1).unwrap();
        assert_eq!(
            dev.frontend_flags(Direction::Rx, 1).unwrap(),
            FrontendFlags {
                dc_offset: false,
                iq_balance: true,
                agc: true,
            }
        );
        assert!(!dev.frontend_flags(Direction::Rx, 0).unwrap().agc);
    }

    #[test]
    fn time_can_be_set() {
        let dev = device();
        dev.set_time_next_pps(TimeSpec::new(100, 0.0), 0).unwrap();
        assert_eq!(dev.time_last_pps(0).unwrap(), TimeSpec::new(100, 0.0));
        assert!(dev.time_now(0).unwrap().as_secs() >= 100.0);
        assert!(dev.time_synchronized().unwrap());
    }
}
