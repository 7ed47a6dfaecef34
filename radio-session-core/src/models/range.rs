use serde::{Deserialize, Serialize};

/// A closed interval with an optional step (0 = continuous).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Range {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    pub fn single(value: f64) -> Self {
        Self::new(value, value, 0.0)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start && value <= self.stop
    }
}

/// A sorted union of ranges, as reported for rates, frequencies and gains.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetaRange(pub Vec<Range>);

impl MetaRange {
    pub fn new(ranges: impl Into<Vec<Range>>) -> Self {
        Self(ranges.into())
    }

    pub fn ranges(&self) -> &[Range] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn start(&self) -> Option<f64> {
        self.0.first().map(|r| r.start)
    }

    pub fn stop(&self) -> Option<f64> {
        self.0.last().map(|r| r.stop)
    }

    /// Clip `value` into the nearest covered point, optionally snapping to
    /// the step of the range it lands in.
    pub fn clip(&self, value: f64, clip_step: bool) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for range in &self.0 {
            let mut candidate = value.clamp(range.start, range.stop);
            if clip_step && range.step > 0.0 {
                let steps = ((candidate - range.start) / range.step).round();
                candidate = (range.start + steps * range.step).min(range.stop);
            }
            let distance = (candidate - value).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }
        best.map(|(v, _)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clip_picks_nearest_range() {
        let range = MetaRange::new([Range::new(0.0, 10.0, 0.0), Range::new(20.0, 30.0, 0.0)]);
        assert_relative_eq!(range.clip(14.0, false).unwrap(), 10.0);
        assert_relative_eq!(range.clip(16.0, false).unwrap(), 20.0);
        assert_relative_eq!(range.clip(25.0, false).unwrap(), 25.0);
        assert_relative_eq!(range.clip(99.0, false).unwrap(), 30.0);
    }

    #[test]
    fn clip_snaps_to_step() {
        let range = MetaRange::new([Range::new(0.0, 31.5, 0.5)]);
        assert_relative_eq!(range.clip(10.3, true).unwrap(), 10.5);
        assert_relative_eq!(range.clip(10.2, true).unwrap(), 10.0);
    }

    #[test]
    fn empty_range_has_no_bounds() {
        let range = MetaRange::default();
        assert!(range.is_empty());
        assert!(range.start().is_none());
        assert!(range.clip(1.0, false).is_none());
    }
}
