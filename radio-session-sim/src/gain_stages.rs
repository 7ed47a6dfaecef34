use radio_session_core::models::error::BackendFault;
use radio_session_core::models::range::{MetaRange, Range};

#[derive(Debug, Clone)]
struct GainStage {
    name: &'static str,
    range: Range,
    value: f64,
}

/// The gain chain of one frontend channel.
///
/// Setting the overall gain fills stages in order, each up to its maximum;
/// setting a named stage touches only that stage.
#[derive(Debug, Clone)]
pub struct GainStages {
    stages: Vec<GainStage>,
}

impl GainStages {
    pub fn rx() -> Self {
        Self::new(&[("LNA", Range::new(0.0, 30.0, 1.0)), ("PGA", Range::new(0.0, 31.5, 0.5))])
    }

    pub fn tx() -> Self {
        Self::new(&[("PGA", Range::new(0.0, 31.5, 0.5)), ("PA", Range::new(0.0, 20.0, 1.0))])
    }

    fn new(stages: &[(&'static str, Range)]) -> Self {
        Self {
            stages: stages
                .iter()
                .map(|&(name, range)| GainStage {
                    name,
                    range,
                    value: range.start,
                })
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.to_string()).collect()
    }

    pub fn total(&self) -> f64 {
        self.stages.iter().map(|s| s.value).sum()
    }

    pub fn total_range(&self) -> MetaRange {
        let start = self.stages.iter().map(|s| s.range.start).sum();
        let stop = self.stages.iter().map(|s| s.range.stop).sum();
        let step = self
            .stages
            .iter()
            .map(|s| s.range.step)
            .filter(|&s| s > 0.0)
            .fold(f64::INFINITY, f64::min);
        MetaRange::new([Range::new(start, stop, if step.is_finite() { step } else { 0.0 })])
    }

    /// Distribute `gain` across the stages and return the applied total.
    pub fn set_total(&mut self, gain: f64) -> f64 {
        let mut remaining = self.total_range().clip(gain, false).unwrap_or(0.0);
        for stage in &mut self.stages {
            let wanted = remaining.min(stage.range.stop);
            stage.value = MetaRange::new([stage.range]).clip(wanted, true).unwrap_or(stage.range.start);
            remaining -= stage.value;
        }
        self.total()
    }

    pub fn stage_range(&self, name: &str) -> Result<MetaRange, BackendFault> {
        self.find(name).map(|s| MetaRange::new([s.range]))
    }

    pub fn stage(&self, name: &str) -> Result<f64, BackendFault> {
        self.find(name).map(|s| s.value)
    }

    pub fn set_stage(&mut self, name: &str, gain: f64) -> Result<f64, BackendFault> {
        let stage = self
            .stages
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| BackendFault::key(format!("no gain stage named \"{}\"", name)))?;
        stage.value = MetaRange::new([stage.range]).clip(gain, true).unwrap_or(stage.range.start);
        Ok(stage.value)
    }

    /// Overall gain mapped onto `[0, 1]`.
    pub fn normalized(&self) -> f64 {
        let range = self.total_range();
        let (start, stop) = (range.start().unwrap_or(0.0), range.stop().unwrap_or(0.0));
        if stop <= start {
            return 0.0;
        }
        (self.total() - start) / (stop - start)
    }

    pub fn set_normalized(&mut self, value: f64) -> Result<f64, BackendFault> {
        if !(0.0..=1.0).contains(&value) {
            return Err(BackendFault::value(format!("normalized gain {} is outside [0, 1]", value)));
        }
        let range = self.total_range();
        let (start, stop) = (range.start().unwrap_or(0.0), range.stop().unwrap_or(0.0));
        Ok(self.set_total(start + value * (stop - start)))
    }

    fn find(&self, name: &str) -> Result<&GainStage, BackendFault> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BackendFault::key(format!("no gain stage named \"{}\"", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn overall_gain_fills_stages_in_order() {
        let mut gains = GainStages::rx();
        assert_relative_eq!(gains.set_total(40.0), 40.0);
        assert_relative_eq!(gains.stage("LNA").unwrap(), 30.0);
        assert_relative_eq!(gains.stage("PGA").unwrap(), 10.0);

        assert_relative_eq!(gains.set_total(100.0), 61.5);
        assert_relative_eq!(gains.set_total(-3.0), 0.0);
    }

    #[test]
    fn named_stage_is_independent() {
        let mut gains = GainStages::rx();
        gains.set_total(5.0);
        assert_relative_eq!(gains.set_stage("PGA", 12.3).unwrap(), 12.5);
        assert_relative_eq!(gains.stage("LNA").unwrap(), 5.0);
        assert_relative_eq!(gains.total(), 17.5);
    }

    #[test]
    fn unknown_stage_is_a_key_fault() {
        let mut gains = GainStages::tx();
        let err = gains.set_stage("LNA", 1.0).unwrap_err();
        assert_eq!(err.kind, radio_session_core::FaultKind::Key);
        assert!(gains.stage_range("LNA").is_err());
    }

    #[test]
    fn normalized_gain_spans_total_range() {
        let mut gains = GainStages::tx();
        assert_relative_eq!(gains.set_normalized(1.0).unwrap(), 51.5);
        assert_relative_eq!(gains.normalized(), 1.0);
        assert!(gains.set_normalized(1.5).is_err());
    }

    #[test]
    fn total_range_uses_finest_step() {
        let range = GainStages::rx().total_range();
        assert_eq!(range.ranges(), &[Range::new(0.0, 61.5, 0.5)]);
    }
}
