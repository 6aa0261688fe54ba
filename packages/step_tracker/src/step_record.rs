use std::time::Duration;

use crate::format;

/// The measurement of one completed step.
///
/// Records are created when a step ends and never change afterwards. Timestamps are offsets
/// from the start of the session that recorded the step.
///
/// # Examples
///
/// ```
/// use step_tracker::Session;
///
/// # fn main() -> Result<(), step_tracker::Error> {
/// let session = Session::new();
///
/// session.start_step("parse")?;
/// let record = session.end_step("parse")?;
///
/// assert_eq!(record.name(), "parse");
/// assert!(record.ended_at() >= record.started_at());
/// println!("took {}, memory {}", record.duration_human(), record.memory_delta_human());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StepRecord {
    name: String,
    started_at: Duration,
    ended_at: Duration,

    // None if the memory probe failed at either end of the step.
    memory_delta_bytes: Option<i64>,
}

impl StepRecord {
    /// # Panics
    ///
    /// Panics if `ended_at` is before `started_at`.
    pub(crate) fn new(
        name: String,
        started_at: Duration,
        ended_at: Duration,
        memory_delta_bytes: Option<i64>,
    ) -> Self {
        assert!(
            ended_at >= started_at,
            "step '{name}' cannot end before it starts"
        );

        Self {
            name,
            started_at,
            ended_at,
            memory_delta_bytes,
        }
    }

    /// The name the step was started with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the step started, relative to the start of the session.
    #[must_use]
    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    /// When the step ended, relative to the start of the session.
    #[must_use]
    pub fn ended_at(&self) -> Duration {
        self.ended_at
    }

    /// How long the step took.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.ended_at
            .checked_sub(self.started_at)
            .expect("guarded by constructor assertion")
    }

    /// How long the step took, in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration().as_secs_f64()
    }

    /// The duration formatted with two decimal places, e.g. `0.15 s`.
    #[must_use]
    pub fn duration_human(&self) -> String {
        format::seconds(self.duration())
    }

    /// Change in memory usage between the start and the end of the step.
    ///
    /// Negative if memory was released while the step ran. `None` if the memory probe
    /// failed to take a reading at either end of the step.
    #[must_use]
    pub fn memory_delta_bytes(&self) -> Option<i64> {
        self.memory_delta_bytes
    }

    /// The memory delta formatted in base-1024 units, or `n/a` if unavailable.
    #[must_use]
    pub fn memory_delta_human(&self) -> String {
        format::optional_bytes(self.memory_delta_bytes)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn duration_is_end_minus_start() {
        let record = StepRecord::new(
            "load".to_string(),
            Duration::from_millis(250),
            Duration::from_millis(1750),
            Some(2048),
        );

        assert_eq!(record.duration(), Duration::from_millis(1500));
        assert_eq!(record.duration_human(), "1.50 s");
        assert_eq!(record.memory_delta_human(), "2.00 KB");
    }

    #[test]
    fn zero_length_step_is_valid() {
        let record = StepRecord::new(
            "noop".to_string(),
            Duration::from_secs(1),
            Duration::from_secs(1),
            Some(0),
        );

        assert_eq!(record.duration(), Duration::ZERO);
    }

    #[test]
    fn unavailable_memory_is_marked() {
        let record = StepRecord::new("x".to_string(), Duration::ZERO, Duration::ZERO, None);

        assert_eq!(record.memory_delta_bytes(), None);
        assert_eq!(record.memory_delta_human(), "n/a");
    }

    #[test]
    #[should_panic]
    fn end_before_start_panics() {
        drop(StepRecord::new(
            "backwards".to_string(),
            Duration::from_secs(2),
            Duration::from_secs(1),
            None,
        ));
    }
}
