//! In-crate test doubles for the backend traits.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::error::BackendFault;
use crate::models::info::ChannelInfo;
use crate::models::metadata::{AsyncMetadata, RxMetadata, TxMetadata};
use crate::models::range::{MetaRange, Range};
use crate::models::sensor::SensorValue;
use crate::models::slot::Direction;
use crate::models::stream::{StreamArgs, StreamCommand};
use crate::models::time::TimeSpec;
use crate::models::tune::{TuneRequest, TuneResult};
use crate::traits::device_factory::DeviceFactory;
use crate::traits::device_session::{BackendResult, DeviceSession};
use crate::traits::streamer::{RxStreamer, TxStreamer};

/// Latch that lets a test hold a backend call open.
#[derive(Default)]
pub struct Latch {
    state: Mutex<(bool, bool)>,
    cond: Condvar,
}

impl Latch {
    /// Block the calling backend thread until `release` is called.
    pub fn park(&self) {
        let mut state = self.state.lock();
        state.0 = true;
        self.cond.notify_all();
        while !state.1 {
            self.cond.wait(&mut state);
        }
    }

    pub fn wait_parked(&self) {
        let mut state = self.state.lock();
        while !state.0 {
            self.cond.wait(&mut state);
        }
    }

    pub fn release(&self) {
        self.state.lock().1 = true;
        self.cond.notify_all();
    }
}

pub struct MockRx {
    channels: usize,
    latch: Option<Arc<Latch>>,
}

impl MockRx {
    pub fn new(channels: usize) -> Self {
        Self { channels, latch: None }
    }

    pub fn parked(channels: usize, latch: Arc<Latch>) -> Self {
        Self {
            channels,
            latch: Some(latch),
        }
    }
}

impl RxStreamer for MockRx {
    fn num_channels(&self) -> usize {
        self.channels
    }

    fn max_num_samps(&self) -> usize {
        100
    }

    fn recv(
        &self,
        _buffs: &mut [&mut [u8]],
        _nsamps_per_buff: usize,
        _timeout: Duration,
        _one_packet: bool,
    ) -> Result<(usize, RxMetadata), BackendFault> {
        if let Some(latch) = &self.latch {
            latch.park();
            return Ok((1, RxMetadata::default()));
        }
        Ok((0, RxMetadata::timeout()))
    }

    fn issue_stream_cmd(&self, _cmd: &StreamCommand) -> Result<(), BackendFault> {
        Ok(())
    }
}

pub struct MockTx {
    channels: usize,
}

impl MockTx {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl TxStreamer for MockTx {
    fn num_channels(&self) -> usize {
        self.channels
    }

    fn max_num_samps(&self) -> usize {
        100
    }

    fn send(&self, _buffs: &[&[u8]], nsamps_per_buff: usize, _metadata: &TxMetadata, _timeout: Duration) -> Result<usize, BackendFault> {
        Ok(nsamps_per_buff)
    }

    fn recv_async_msg(&self, _timeout: Duration) -> Result<Option<AsyncMetadata>, BackendFault> {
        Ok(None)
    }
}

/// Session whose gain stages record which accessor was used.
#[derive(Default)]
pub struct MockSession {
    pub name: String,
    pub calls: Mutex<Vec<String>>,
    pub rx_latch: Option<Arc<Latch>>,
}

impl MockSession {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

impl DeviceSession for MockSession {
    fn rx_stream(&self, args: &StreamArgs) -> BackendResult<Arc<dyn RxStreamer>> {
        let channels = args.effective_channels().len();
        Ok(match &self.rx_latch {
            Some(latch) => Arc::new(MockRx::parked(channels, Arc::clone(latch))),
            None => Arc::new(MockRx::new(channels)),
        })
    }

    fn tx_stream(&self, args: &StreamArgs) -> BackendResult<Arc<dyn TxStreamer>> {
        Ok(Arc::new(MockTx::new(args.effective_channels().len())))
    }

    fn channel_info(&self, _dir: Direction, _chan: usize) -> BackendResult<ChannelInfo> {
        Ok(ChannelInfo::default())
    }

    fn pp_string(&self) -> BackendResult<String> {
        Ok(format!("mock {}", self.name))
    }

    fn mboard_name(&self, mboard: usize) -> BackendResult<String> {
        if mboard > 0 {
            return Err(BackendFault::index(format!("mboard {} out of range", mboard)));
        }
        if self.name == "panic" {
            panic!("mboard name unavailable");
        }
        Ok(self.name.clone())
    }

    fn num_mboards(&self) -> BackendResult<usize> {
        Ok(1)
    }

    fn set_master_clock_rate(&self, _rate: f64, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn master_clock_rate(&self, _mboard: usize) -> BackendResult<f64> {
        Ok(32e6)
    }

    fn time_now(&self, _mboard: usize) -> BackendResult<TimeSpec> {
        Ok(TimeSpec::default())
    }

    fn time_last_pps(&self, _mboard: usize) -> BackendResult<TimeSpec> {
        Ok(TimeSpec::default())
    }

    fn set_time_now(&self, _time: TimeSpec, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn set_time_next_pps(&self, _time: TimeSpec, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn set_time_unknown_pps(&self, _time: TimeSpec) -> BackendResult<()> {
        Ok(())
    }

    fn time_synchronized(&self) -> BackendResult<bool> {
        Ok(true)
    }

    fn set_command_time(&self, _time: TimeSpec, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn clear_command_time(&self, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn issue_stream_cmd(&self, _cmd: &StreamCommand, _chan: usize) -> BackendResult<()> {
        Ok(())
    }

    fn set_time_source(&self, _source: &str, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn time_source(&self, _mboard: usize) -> BackendResult<String> {
        Ok("internal".into())
    }

    fn time_sources(&self, _mboard: usize) -> BackendResult<Vec<String>> {
        Ok(vec!["internal".into(), "external".into()])
    }

    fn set_clock_source(&self, source: &str, _mboard: usize) -> BackendResult<()> {
        if source != "internal" {
            return Err(BackendFault::value(format!("unsupported clock source: {}", source)));
        }
        Ok(())
    }

    fn clock_source(&self, _mboard: usize) -> BackendResult<String> {
        Ok("internal".into())
    }

    fn clock_sources(&self, _mboard: usize) -> BackendResult<Vec<String>> {
        Ok(vec!["internal".into()])
    }

    fn set_clock_source_out(&self, _enable: bool, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn mboard_sensor(&self, name: &str, _mboard: usize) -> BackendResult<SensorValue> {
        Ok(SensorValue::boolean(name, true, "locked", "unlocked"))
    }

    fn mboard_sensor_names(&self, _mboard: usize) -> BackendResult<Vec<String>> {
        Ok(vec!["ref_locked".into()])
    }

    fn set_subdev_spec(&self, _dir: Direction, _spec: &str, _mboard: usize) -> BackendResult<()> {
        Ok(())
    }

    fn subdev_spec(&self, _dir: Direction, _mboard: usize) -> BackendResult<String> {
        Ok("A:0".into())
    }

    fn num_channels(&self, _dir: Direction) -> BackendResult<usize> {
        Ok(1)
    }

    fn subdev_name(&self, _dir: Direction, _chan: usize) -> BackendResult<String> {
        Ok("mock".into())
    }

    fn set_rate(&self, _dir: Direction, _rate: f64, _chan: usize) -> BackendResult<()> {
        Ok(())
    }

    fn rate(&self, _dir: Direction, _chan: usize) -> BackendResult<f64> {
        Ok(1e6)
    }

    fn rates(&self, _dir: Direction, _chan: usize) -> BackendResult<MetaRange> {
        Ok(MetaRange::new([Range::new(1e5, 32e6, 0.0)]))
    }

    fn set_freq(&self, _dir: Direction, request: &TuneRequest, _chan: usize) -> BackendResult<TuneResult> {
        Ok(TuneResult {
            clipped_rf_freq: request.target_freq,
            target_rf_freq: request.target_freq,
            actual_rf_freq: request.target_freq,
            ..TuneResult::default()
        })
    }

    fn freq(&self, _dir: Direction, _chan: usize) -> BackendResult<f64> {
        Ok(0.0)
    }

    fn freq_range(&self, _dir: Direction, _chan: usize) -> BackendResult<MetaRange> {
        Ok(MetaRange::default())
    }

    fn fe_freq_range(&self, _dir: Direction, _chan: usize) -> BackendResult<MetaRange> {
        Ok(MetaRange::default())
    }

    fn set_gain(&self, dir: Direction, gain: f64, chan: usize) -> BackendResult<()> {
        self.record(format!("set_gain {} {} {}", dir, gain, chan));
        Ok(())
    }

    fn set_named_gain(&self, dir: Direction, gain: f64, name: &str, chan: usize) -> BackendResult<()> {
        self.record(format!("set_named_gain {} {} {} {}", dir, gain, name, chan));
        Ok(())
    }

    fn gain(&self, _dir: Direction, _chan: usize) -> BackendResult<f64> {
        Ok(10.0)
    }

    fn named_gain(&self, _dir: Direction, name: &str, _chan: usize) -> BackendResult<f64> {
        if name != "PGA" {
            return Err(BackendFault::key(format!("no gain stage named {}", name)));
        }
        Ok(4.0)
    }

    fn set_normalized_gain(&self, _dir: Direction, _gain: f64, _chan: usize) -> BackendResult<()> {
        Ok(())
    }

    fn normalized_gain(&self, _dir: Direction, _chan: usize) -> BackendResult<f64> {
        Ok(0.5)
    }

    fn gain_range(&self, _dir: Direction, name: Option<&str>, _chan: usize) -> BackendResult<MetaRange> {
        let stop = if name.is_some() { 20.0 } else { 40.0 };
        Ok(MetaRange::new([Range::new(0.0, stop, 1.0)]))
    }

    fn gain_names(&self, _dir: Direction, _chan: usize) -> BackendResult<Vec<String>> {
        Ok(vec!["PGA".into()])
    }

    fn set_antenna(&self, _dir: Direction, _antenna: &str, _chan: usize) -> BackendResult<()> {
        Ok(())
    }

    fn antenna(&self, _dir: Direction, _chan: usize) -> BackendResult<String> {
        Ok("RX2".into())
    }

    fn antennas(&self, _dir: Direction, _chan: usize) -> BackendResult<Vec<String>> {
        Ok(vec!["TX/RX".into(), "RX2".into()])
    }

    fn set_bandwidth(&self, _dir: Direction, _bandwidth: f64, _chan: usize) -> BackendResult<()> {
        Ok(())
    }

    fn bandwidth(&self, _dir: Direction, _chan: usize) -> BackendResult<f64> {
        Ok(1e6)
    }

    fn bandwidth_range(&self, _dir: Direction, _chan: usize) -> BackendResult<MetaRange> {
        Ok(MetaRange::default())
    }

    fn sensor(&self, _dir: Direction, name: &str, _chan: usize) -> BackendResult<SensorValue> {
        Ok(SensorValue::real(name, -70.0, "dBm"))
    }

    fn sensor_names(&self, _dir: Direction, _chan: usize) -> BackendResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn set_dc_offset_enabled(&self, _dir: Direction, _enable: bool, _chan: usize) -> BackendResult<()> {
        Ok(())
    }

    fn set_iq_balance_enabled(&self, _dir: Direction, _enable: bool, _chan: usize) -> BackendResult<()> {
        Ok(())
    }
}

/// Factory producing [`MockSession`]s. `args == "fail"` fails construction.
#[derive(Default)]
pub struct MockFactory {
    pub rx_latch: Option<Arc<Latch>>,
}

impl DeviceFactory for MockFactory {
    fn find(&self, args: &str) -> Result<Vec<String>, BackendFault> {
        Ok(vec![format!("type=mock,{}", args)])
    }

    fn make(&self, args: &str) -> Result<Arc<dyn DeviceSession>, BackendFault> {
        if args == "fail" {
            return Err(BackendFault::io("device unreachable"));
        }
        if args == "panic" {
            panic!("backend exploded during construction");
        }
        Ok(Arc::new(MockSession {
            name: args.to_string(),
            calls: Mutex::new(Vec::new()),
            rx_latch: self.rx_latch.clone(),
        }))
    }
}
