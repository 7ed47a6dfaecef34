use serde::{Deserialize, Serialize};

/// Device time as whole seconds plus a fractional part in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSpec {
    pub full_secs: i64,
    pub frac_secs: f64,
}

impl TimeSpec {
    pub fn new(full_secs: i64, frac_secs: f64) -> Self {
        let carry = frac_secs.floor();
        Self {
            full_secs: full_secs + carry as i64,
            frac_secs: frac_secs - carry,
        }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::new(0, secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.full_secs as f64 + self.frac_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalizes_fraction() {
        let t = TimeSpec::new(1, 2.25);
        assert_eq!(t.full_secs, 3);
        assert_relative_eq!(t.frac_secs, 0.25);

        let t = TimeSpec::from_secs(-0.5);
        assert_eq!(t.full_secs, -1);
        assert_relative_eq!(t.frac_secs, 0.5);
        assert_relative_eq!(t.as_secs(), -0.5);
    }
}
