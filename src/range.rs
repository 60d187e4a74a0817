use crate::errors::GrapherError;
use std::fmt;

/// The values to brute force: every integer in [lower, upper)
/// reachable from `lower` in increments of `step`.
///
/// A spec built through [`SweepSpec::new`] or [`SweepSpec::parse`] is
/// always non-empty with a positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSpec {
    pub lower: u64,
    pub upper: u64,
    pub step: u64,
}

impl SweepSpec {
    pub fn new(lower: u64, upper: u64, step: u64) -> Result<SweepSpec, GrapherError> {
        let spec = SweepSpec { lower, upper, step };
        if step == 0 {
            Err(spec.invalid("step must be positive"))
        } else if lower >= upper {
            Err(spec.invalid("lower bound must be below upper bound"))
        } else {
            Ok(spec)
        }
    }

    /// Parse `[lower,upper]` or `[lower,upper,step]`, base 10 only.
    /// The step defaults to 1.
    pub fn parse(raw: &str) -> Result<SweepSpec, GrapherError> {
        let invalid = |reason: &str| GrapherError::InvalidRange {
            spec: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let inner = raw
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| invalid("expected [lower,upper] or [lower,upper,step]"))?;

        let fields: Vec<&str> = inner.split(',').collect();
        if fields.len() != 2 && fields.len() != 3 {
            return Err(invalid("expected two or three comma separated fields"));
        }

        let mut numbers = [0i64, 0, 1];
        for (i, field) in fields.iter().enumerate() {
            let field = field.trim();
            numbers[i] = field
                .parse()
                .map_err(|_| invalid(&format!("{:?} is not a base 10 integer", field)))?;
        }

        let [lower, upper, step] = numbers;
        if step <= 0 {
            return Err(invalid("step must be positive"));
        }
        if lower < 0 || upper < 0 {
            return Err(invalid("bounds must be non-negative"));
        }
        SweepSpec::new(lower as u64, upper as u64, step as u64)
    }

    /// Lazy, restartable sequence of sample points. Strictly
    /// increasing by `step`, starting at `lower`, every element below
    /// `upper`.
    pub fn values(&self) -> impl Iterator<Item = u64> {
        (self.lower..self.upper).step_by(self.step as usize)
    }

    /// Number of sample points, ceil((upper - lower) / step).
    pub fn len(&self) -> usize {
        ((self.upper - self.lower + self.step - 1) / self.step) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.lower >= self.upper
    }

    fn invalid(&self, reason: &str) -> GrapherError {
        GrapherError::InvalidRange {
            spec: self.to_string(),
            reason: reason.to_owned(),
        }
    }
}

impl fmt::Display for SweepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.lower, self.upper, self.step)
    }
}
