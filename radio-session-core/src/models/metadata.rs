use serde::{Deserialize, Serialize};

use super::time::TimeSpec;

/// Outcome reported alongside received samples.
///
/// `Timeout` is a normal result of a bounded-wait receive, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RxErrorCode {
    #[default]
    None,
    Timeout,
    LateCommand,
    BrokenChain,
    Overflow,
    Alignment,
    BadPacket,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RxMetadata {
    pub has_time_spec: bool,
    pub time_spec: TimeSpec,
    pub more_fragments: bool,
    pub fragment_offset: usize,
    pub start_of_burst: bool,
    pub end_of_burst: bool,
    pub out_of_sequence: bool,
    pub error_code: RxErrorCode,
}

impl RxMetadata {
    pub fn timeout() -> Self {
        Self {
            error_code: RxErrorCode::Timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TxMetadata {
    pub has_time_spec: bool,
    pub time_spec: TimeSpec,
    pub start_of_burst: bool,
    pub end_of_burst: bool,
}

/// Event reported on the transmit async message queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsyncEventCode {
    BurstAck,
    Underflow,
    SeqError,
    TimeError,
    UnderflowInPacket,
    SeqErrorInBurst,
    UserPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AsyncMetadata {
    pub channel: usize,
    pub has_time_spec: bool,
    pub time_spec: TimeSpec,
    pub event_code: AsyncEventCode,
}
