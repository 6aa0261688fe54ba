use std::time::Duration;

use crate::{Error, Result, StepRecord};

/// Summary statistics over a sequence of completed steps.
///
/// Produced by [`summarize()`]. Always describes at least one step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Summary {
    step_count: usize,
    total_duration: Duration,
    average_duration: Duration,
    max_duration: Duration,
    max_duration_step_name: String,
    peak_memory_bytes: Option<i64>,
}

impl Summary {
    /// Number of steps summarized.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Sum of the durations of all steps.
    ///
    /// Overlapping (nested) steps are each counted in full, so this may exceed the
    /// elapsed time of the session.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Mean duration of a step.
    #[must_use]
    pub fn average_duration(&self) -> Duration {
        self.average_duration
    }

    /// Duration of the longest step.
    #[must_use]
    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Name of the longest step. If several steps share the longest duration, the one
    /// that completed first is named.
    #[must_use]
    pub fn max_duration_step_name(&self) -> &str {
        &self.max_duration_step_name
    }

    /// The largest memory delta of any single step.
    ///
    /// This is a per-step peak, not cumulative memory usage. `None` if no step has a
    /// memory measurement.
    #[must_use]
    pub fn peak_memory_bytes(&self) -> Option<i64> {
        self.peak_memory_bytes
    }
}

/// Computes summary statistics over completed steps.
///
/// This is a pure function of its input.
///
/// # Errors
///
/// Returns [`Error::NoData`] if `steps` is empty, as there is no meaningful average
/// or maximum of nothing.
///
/// # Examples
///
/// ```
/// use step_tracker::{Session, summarize};
///
/// # fn main() -> Result<(), step_tracker::Error> {
/// let session = Session::new();
/// session.bracket("a", || ())?;
/// session.bracket("b", || ())?;
///
/// let summary = summarize(&session.steps())?;
/// assert_eq!(summary.step_count(), 2);
/// assert!(summarize(&[]).is_err());
/// # Ok(())
/// # }
/// ```
pub fn summarize(steps: &[StepRecord]) -> Result<Summary> {
    let (first, rest) = steps.split_first().ok_or(Error::NoData)?;

    let mut total_duration = first.duration();
    let mut longest = first;

    for step in rest {
        total_duration = total_duration.checked_add(step.duration()).expect(
            "step duration accumulation overflows Duration - this indicates an unrealistic scenario",
        );

        // Strictly greater, so that the first of several equally long steps wins.
        if step.duration() > longest.duration() {
            longest = step;
        }
    }

    let step_count = steps.len();

    let average_duration = total_duration
        .checked_div(
            u32::try_from(step_count)
                .expect("more than u32::MAX steps - this indicates an unrealistic scenario"),
        )
        .expect("guarded by the empty check above");

    let peak_memory_bytes = steps
        .iter()
        .filter_map(StepRecord::memory_delta_bytes)
        .max();

    Ok(Summary {
        step_count,
        total_duration,
        average_duration,
        max_duration: longest.duration(),
        max_duration_step_name: longest.name().to_owned(),
        peak_memory_bytes,
    })
}
