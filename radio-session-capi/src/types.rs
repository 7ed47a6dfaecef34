//! C-compatible value types and the boxed handle wrappers.

use std::os::raw::{c_char, c_int};

use radio_session_core::{
    AsyncEventCode, AsyncMetadata, Direction, RxErrorCode, RxMetadata, RxStreamerHandle, SensorReading, SensorValue,
    StreamMode, TimeSpec, TunePolicy, TuneResult, TxMetadata, TxStreamerHandle,
};

pub const RS_DIR_RX: c_int = 0;
pub const RS_DIR_TX: c_int = 1;

pub const RS_STREAM_MODE_START_CONTINUOUS: c_int = 0;
pub const RS_STREAM_MODE_STOP_CONTINUOUS: c_int = 1;
pub const RS_STREAM_MODE_NUM_SAMPS_AND_DONE: c_int = 2;
pub const RS_STREAM_MODE_NUM_SAMPS_AND_MORE: c_int = 3;

pub const RS_TUNE_POLICY_NONE: c_int = 0;
pub const RS_TUNE_POLICY_AUTO: c_int = 1;
pub const RS_TUNE_POLICY_MANUAL: c_int = 2;

pub const RS_SENSOR_BOOLEAN: c_int = 0;
pub const RS_SENSOR_INTEGER: c_int = 1;
pub const RS_SENSOR_REAL: c_int = 2;
pub const RS_SENSOR_STRING: c_int = 3;

/// Boxed RX streamer handle plus the byte width of one host sample.
pub struct RsRxStreamer {
    pub(crate) handle: RxStreamerHandle,
    pub(crate) item_size: usize,
}

/// Boxed TX streamer handle plus the byte width of one host sample.
pub struct RsTxStreamer {
    pub(crate) handle: TxStreamerHandle,
    pub(crate) item_size: usize,
}

/// Streamer construction arguments.
///
/// `args` may be null. `channel_list` may be null when `n_channels` is 0,
/// which selects channel 0.
#[repr(C)]
pub struct RsStreamArgs {
    pub cpu_format: *const c_char,
    pub otw_format: *const c_char,
    pub args: *const c_char,
    pub channel_list: *const usize,
    pub n_channels: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RsStreamCmd {
    pub stream_mode: c_int,
    pub num_samps: usize,
    pub stream_now: bool,
    pub time_spec_full_secs: i64,
    pub time_spec_frac_secs: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RsTuneRequest {
    pub target_freq: f64,
    pub rf_freq_policy: c_int,
    pub rf_freq: f64,
    pub dsp_freq_policy: c_int,
    pub dsp_freq: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RsTuneResult {
    pub clipped_rf_freq: f64,
    pub target_rf_freq: f64,
    pub actual_rf_freq: f64,
    pub target_dsp_freq: f64,
    pub actual_dsp_freq: f64,
}

impl From<TuneResult> for RsTuneResult {
    fn from(r: TuneResult) -> Self {
        Self {
            clipped_rf_freq: r.clipped_rf_freq,
            target_rf_freq: r.target_rf_freq,
            actual_rf_freq: r.actual_rf_freq,
            target_dsp_freq: r.target_dsp_freq,
            actual_dsp_freq: r.actual_dsp_freq,
        }
    }
}

/// RX metadata. `error_code` uses the `RS_RX_ERROR_*` numbering:
/// 0 none, 1 timeout, 2 late command, 3 broken chain, 4 overflow,
/// 5 alignment, 6 bad packet.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RsRxMetadata {
    pub has_time_spec: bool,
    pub time_spec_full_secs: i64,
    pub time_spec_frac_secs: f64,
    pub more_fragments: bool,
    pub fragment_offset: usize,
    pub start_of_burst: bool,
    pub end_of_burst: bool,
    pub out_of_sequence: bool,
    pub error_code: c_int,
}

impl From<RxMetadata> for RsRxMetadata {
    fn from(md: RxMetadata) -> Self {
        Self {
            has_time_spec: md.has_time_spec,
            time_spec_full_secs: md.time_spec.full_secs,
            time_spec_frac_secs: md.time_spec.frac_secs,
            more_fragments: md.more_fragments,
            fragment_offset: md.fragment_offset,
            start_of_burst: md.start_of_burst,
            end_of_burst: md.end_of_burst,
            out_of_sequence: md.out_of_sequence,
            error_code: match md.error_code {
                RxErrorCode::None => 0,
                RxErrorCode::Timeout => 1,
                RxErrorCode::LateCommand => 2,
                RxErrorCode::BrokenChain => 3,
                RxErrorCode::Overflow => 4,
                RxErrorCode::Alignment => 5,
                RxErrorCode::BadPacket => 6,
            },
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RsTxMetadata {
    pub has_time_spec: bool,
    pub time_spec_full_secs: i64,
    pub time_spec_frac_secs: f64,
    pub start_of_burst: bool,
    pub end_of_burst: bool,
}

impl From<&RsTxMetadata> for TxMetadata {
    fn from(md: &RsTxMetadata) -> Self {
        Self {
            has_time_spec: md.has_time_spec,
            time_spec: TimeSpec::new(md.time_spec_full_secs, md.time_spec_frac_secs),
            start_of_burst: md.start_of_burst,
            end_of_burst: md.end_of_burst,
        }
    }
}

/// Async TX event. `event_code` values: 1 burst ack, 2 underflow,
/// 4 sequence error, 8 time error, 16 underflow in packet,
/// 32 sequence error in burst, 64 user payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RsAsyncMetadata {
    pub channel: usize,
    pub has_time_spec: bool,
    pub time_spec_full_secs: i64,
    pub time_spec_frac_secs: f64,
    pub event_code: c_int,
}

impl From<AsyncMetadata> for RsAsyncMetadata {
    fn from(md: AsyncMetadata) -> Self {
        Self {
            channel: md.channel,
            has_time_spec: md.has_time_spec,
            time_spec_full_secs: md.time_spec.full_secs,
            time_spec_frac_secs: md.time_spec.frac_secs,
            event_code: match md.event_code {
                AsyncEventCode::BurstAck => 0x1,
                AsyncEventCode::Underflow => 0x2,
                AsyncEventCode::SeqError => 0x4,
                AsyncEventCode::TimeError => 0x8,
                AsyncEventCode::UnderflowInPacket => 0x10,
                AsyncEventCode::SeqErrorInBurst => 0x20,
                AsyncEventCode::UserPayload => 0x40,
            },
        }
    }
}

/// Numeric view of a sensor reading. `data_type` is one of the
/// `RS_SENSOR_*` constants; string readings leave the numeric fields zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RsSensorValue {
    pub data_type: c_int,
    pub as_bool: bool,
    pub as_int: i64,
    pub as_real: f64,
}

impl From<&SensorValue> for RsSensorValue {
    fn from(value: &SensorValue) -> Self {
        match value.reading {
            SensorReading::Boolean(v) => Self {
                data_type: RS_SENSOR_BOOLEAN,
                as_bool: v,
                as_int: i64::from(v),
                as_real: if v { 1.0 } else { 0.0 },
            },
            SensorReading::Integer(v) => Self {
                data_type: RS_SENSOR_INTEGER,
                as_bool: v != 0,
                as_int: v,
                as_real: v as f64,
            },
            SensorReading::Real(v) => Self {
                data_type: RS_SENSOR_REAL,
                as_bool: v != 0.0,
                as_int: v as i64,
                as_real: v,
            },
            SensorReading::String(_) => Self {
                data_type: RS_SENSOR_STRING,
                ..Self::default()
            },
        }
    }
}

pub(crate) fn direction(value: c_int) -> Option<Direction> {
    match value {
        RS_DIR_RX => Some(Direction::Rx),
        RS_DIR_TX => Some(Direction::Tx),
        _ => None,
    }
}

pub(crate) fn stream_mode(value: c_int) -> Option<StreamMode> {
    match value {
        RS_STREAM_MODE_START_CONTINUOUS => Some(StreamMode::StartContinuous),
        RS_STREAM_MODE_STOP_CONTINUOUS => Some(StreamMode::StopContinuous),
        RS_STREAM_MODE_NUM_SAMPS_AND_DONE => Some(StreamMode::NumSampsAndDone),
        RS_STREAM_MODE_NUM_SAMPS_AND_MORE => Some(StreamMode::NumSampsAndMore),
        _ => None,
    }
}

pub(crate) fn tune_policy(value: c_int) -> Option<TunePolicy> {
    match value {
        RS_TUNE_POLICY_NONE => Some(TunePolicy::None),
        RS_TUNE_POLICY_AUTO => Some(TunePolicy::Auto),
        RS_TUNE_POLICY_MANUAL => Some(TunePolicy::Manual),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_metadata_codes() {
        assert_eq!(RsRxMetadata::from(RxMetadata::timeout()).error_code, 1);
        assert_eq!(RsRxMetadata::from(RxMetadata::default()).error_code, 0);
    }

    #[test]
    fn sensor_readings_widen_to_every_field() {
        let locked = RsSensorValue::from(&SensorValue::boolean("lo_locked", true, "locked", "unlocked"));
        assert_eq!((locked.data_type, locked.as_bool, locked.as_int), (RS_SENSOR_BOOLEAN, true, 1));

        let temp = RsSensorValue::from(&SensorValue::real("temp", 42.5, "C"));
        assert_eq!((temp.data_type, temp.as_int, temp.as_real), (RS_SENSOR_REAL, 42, 42.5));
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        assert_eq!(direction(RS_DIR_TX), Some(Direction::Tx));
        assert_eq!(direction(7), None);
        assert_eq!(stream_mode(-1), None);
        assert_eq!(tune_policy(RS_TUNE_POLICY_MANUAL), Some(TunePolicy::Manual));
    }
}
