use serde::{Deserialize, Serialize};

use super::time::TimeSpec;

/// Arguments for constructing an RX or TX streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamArgs {
    /// Host-side sample format, e.g. `fc32` or `sc16`.
    pub cpu_format: String,

    /// Over-the-wire sample format, e.g. `sc16` or `sc8`.
    pub otw_format: String,

    /// Backend-specific extra arguments.
    pub args: String,

    /// Channel indices carried by the streamer. Empty means channel 0.
    pub channels: Vec<usize>,
}

impl StreamArgs {
    pub fn new(cpu_format: impl Into<String>, otw_format: impl Into<String>) -> Self {
        Self {
            cpu_format: cpu_format.into(),
            otw_format: otw_format.into(),
            args: String::new(),
            channels: Vec::new(),
        }
    }

    pub fn with_channels(mut self, channels: impl Into<Vec<usize>>) -> Self {
        self.channels = channels.into();
        self
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// Bytes per sample of `cpu_format`, for the formats this crate knows.
    pub fn cpu_item_size(&self) -> Option<usize> {
        match self.cpu_format.as_str() {
            "fc64" => Some(16),
            "fc32" => Some(8),
            "sc16" => Some(4),
            "sc8" => Some(2),
            _ => None,
        }
    }

    /// Channel list with the empty-list default applied.
    pub fn effective_channels(&self) -> Vec<usize> {
        if self.channels.is_empty() {
            vec![0]
        } else {
            self.channels.clone()
        }
    }
}

impl Default for StreamArgs {
    fn default() -> Self {
        Self::new("fc32", "sc16")
    }
}

/// How a receive stream command starts and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamMode {
    StartContinuous,
    StopContinuous,
    NumSampsAndDone,
    NumSampsAndMore,
}

/// A command controlling when and how much a receiver streams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamCommand {
    pub mode: StreamMode,
    pub num_samps: usize,
    pub stream_now: bool,
    pub time_spec: TimeSpec,
}

impl StreamCommand {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            num_samps: 0,
            stream_now: true,
            time_spec: TimeSpec::default(),
        }
    }

    pub fn start_continuous() -> Self {
        Self::new(StreamMode::StartContinuous)
    }

    pub fn stop_continuous() -> Self {
        Self::new(StreamMode::StopContinuous)
    }

    pub fn num_samps_and_done(num_samps: usize) -> Self {
        Self {
            num_samps,
            ..Self::new(StreamMode::NumSampsAndDone)
        }
    }
}
