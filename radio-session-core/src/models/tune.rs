use serde::{Deserialize, Serialize};

/// How a tune request treats the RF or DSP stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TunePolicy {
    /// Leave the stage where it is.
    None,
    /// Let the backend choose.
    #[default]
    Auto,
    /// Use the frequency given in the request.
    Manual,
}

/// A request to tune a frontend channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TuneRequest {
    pub target_freq: f64,
    pub rf_freq_policy: TunePolicy,
    pub rf_freq: f64,
    pub dsp_freq_policy: TunePolicy,
    pub dsp_freq: f64,
    pub args: String,
}

impl TuneRequest {
    pub fn new(target_freq: f64) -> Self {
        Self {
            target_freq,
            ..Self::default()
        }
    }

    /// Tune the RF stage to `target_freq + lo_offset` and make up the
    /// difference in the DSP stage.
    pub fn with_lo_offset(target_freq: f64, lo_offset: f64) -> Self {
        Self {
            target_freq,
            rf_freq_policy: TunePolicy::Manual,
            rf_freq: target_freq + lo_offset,
            ..Self::default()
        }
    }
}

/// What the backend actually did for a tune request.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TuneResult {
    pub clipped_rf_freq: f64,
    pub target_rf_freq: f64,
    pub actual_rf_freq: f64,
    pub target_dsp_freq: f64,
    pub actual_dsp_freq: f64,
}
