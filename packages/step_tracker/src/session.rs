use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use foldhash::{HashMap, HashMapExt};
use tracing::{debug, warn};

use crate::{
    Clock, ERR_POISONED_LOCK, Error, MemoryProbe, MemoryReading, Metadata, ProbeError, Report,
    Result, SessionBuilder, StepGuard, StepRecord,
};

/// Collects the measurements of named steps during one run of a program.
///
/// A session owns the log of completed steps, the steps that are currently open and the
/// metadata describing the run. Steps are logged in the order they complete.
///
/// Steps with different names may be open at the same time, which is how nested steps are
/// measured. A step name may only be open once at a time but may be reused after the step
/// has ended, producing one record per use.
///
/// All operations take `&self`, so a session can be shared between threads.
///
/// # Examples
///
/// ```
/// use step_tracker::Session;
///
/// # fn main() -> Result<(), step_tracker::Error> {
/// let session = Session::builder().metadata("script", "backup").build();
///
/// session.bracket("scan", || {
///     // Scan the file system.
/// })?;
///
/// {
///     let _step = session.step("upload")?;
///     // Upload the files. The step ends when `_step` is dropped.
/// }
///
/// let report = session.to_report()?;
/// assert_eq!(report.rows().len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Session {
    metadata: Metadata,

    // Wall-clock time of session creation, for display only.
    started_at: DateTime<Utc>,

    // Clock reading at session creation. Step timestamps are offsets from this.
    origin: Duration,

    clock: Arc<dyn Clock>,

    // None if memory is not measured, in which case all memory deltas are unavailable.
    memory_probe: Option<Arc<dyn MemoryProbe>>,

    state: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    // Append-only, in completion order.
    steps: Vec<StepRecord>,

    open_steps: HashMap<String, OpenStep>,
}

#[derive(Debug)]
struct OpenStep {
    started: Duration,
    memory_before: Option<i64>,
}

impl Session {
    /// Creates a session with no metadata that measures time with [`SystemClock`](crate::SystemClock).
    ///
    /// On Linux, memory is measured with [`ResidentMemoryProbe`](crate::ResidentMemoryProbe).
    /// On other platforms memory is not measured by default.
    ///
    /// Use [`Session::builder()`] to attach metadata or to use different probes.
    #[expect(
        clippy::new_without_default,
        reason = "a session starts its timer on creation, which is not what a default value should do"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring a new session.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_parts(
        metadata: Metadata,
        clock: Arc<dyn Clock>,
        memory_probe: Option<Arc<dyn MemoryProbe>>,
    ) -> Self {
        let origin = clock.now();

        Self {
            metadata,
            started_at: Utc::now(),
            origin,
            clock,
            memory_probe,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Starts measuring a step.
    ///
    /// The step remains open until [`end_step()`](Self::end_step) is called with the same name.
    /// Prefer [`bracket()`](Self::bracket) or [`step()`](Self::step), which end the step even if
    /// the measured code fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyStepName`] if `name` is empty.
    ///
    /// Returns [`Error::DuplicateStep`] if a step with the same name is already open.
    ///
    /// Returns [`Error::Probe`] if the memory probe fails. The step is not started in that case.
    pub fn start_step(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::EmptyStepName);
        }

        // Duplicates are rejected before the probe is read. Checked again under the lock below,
        // as another thread may open the step in between.
        if self
            .state
            .lock()
            .expect(ERR_POISONED_LOCK)
            .open_steps
            .contains_key(&name)
        {
            return Err(Error::DuplicateStep { name });
        }

        // Memory first, so that the cost of the probe is not attributed to the step.
        let memory_before = match self.read_memory() {
            Ok(reading) => reading.map(|reading| reading.total()),
            Err(source) => {
                warn!(step = %name, error = %source, "memory probe failed, step not started");
                return Err(Error::Probe { step: name, source });
            }
        };
        let started = self.clock.now();

        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if state.open_steps.contains_key(&name) {
            return Err(Error::DuplicateStep { name });
        }

        debug!(step = %name, "step started");

        state.open_steps.insert(
            name,
            OpenStep {
                started,
                memory_before,
            },
        );

        Ok(())
    }

    /// Ends a step and appends its measurement to the session log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStep`] if no step with this name is open. The session is
    /// left unchanged.
    ///
    /// Returns [`Error::Probe`] if the memory probe fails. The step is still ended and
    /// recorded, with its memory delta marked as unavailable.
    pub fn end_step(&self, name: &str) -> Result<StepRecord> {
        // Clock first, so that the cost of the probe is not attributed to the step.
        let ended = self.clock.now();
        let memory_after = self.read_memory();

        let record = {
            let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

            let open_step = state
                .open_steps
                .remove(name)
                .ok_or_else(|| Error::UnknownStep {
                    name: name.to_owned(),
                })?;

            let started_at = open_step.started.saturating_sub(self.origin);
            // Clamped so that a clock going backwards cannot produce a negative duration.
            let ended_at = ended.saturating_sub(self.origin).max(started_at);

            let memory_delta = memory_after
                .as_ref()
                .ok()
                .and_then(Option::as_ref)
                .zip(open_step.memory_before)
                .map(|(reading, before)| reading.total().saturating_sub(before));

            let record = StepRecord::new(name.to_owned(), started_at, ended_at, memory_delta);
            state.steps.push(record.clone());
            record
        };

        debug!(
            step = %name,
            duration = ?record.duration(),
            memory_delta_bytes = ?record.memory_delta_bytes(),
            "step ended"
        );

        if let Err(source) = memory_after {
            warn!(step = %name, error = %source, "memory probe failed, step recorded without memory delta");
            return Err(Error::Probe {
                step: name.to_owned(),
                source,
            });
        }

        Ok(record)
    }

    fn read_memory(&self) -> std::result::Result<Option<MemoryReading>, ProbeError> {
        self.memory_probe
            .as_ref()
            .map(|probe| probe.memory_used())
            .transpose()
    }

    /// Starts a step that ends when the returned guard is dropped.
    ///
    /// The step is ended even if the thread panics while the guard is alive. Use
    /// [`StepGuard::finish()`] to end the step explicitly and observe errors.
    ///
    /// # Errors
    ///
    /// Same as [`start_step()`](Self::start_step).
    ///
    /// # Examples
    ///
    /// ```
    /// use step_tracker::Session;
    ///
    /// # fn main() -> Result<(), step_tracker::Error> {
    /// let session = Session::new();
    ///
    /// {
    ///     let _outer = session.step("outer")?;
    ///     let inner = session.step("inner")?;
    ///     let record = inner.finish()?;
    ///     assert_eq!(record.name(), "inner");
    /// }
    ///
    /// assert_eq!(session.steps().len(), 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn step(&self, name: impl Into<String>) -> Result<StepGuard<'_>> {
        let name = name.into();
        self.start_step(name.clone())?;
        Ok(StepGuard::new(self, name))
    }

    /// Runs `f` as a step, returning its result.
    ///
    /// The step is always recorded before this returns or unwinds, including when `f` panics.
    /// If `f` returns a `Result`, an `Err` from `f` is passed through inside `Ok` after the
    /// step has been recorded.
    ///
    /// Steps with different names may be bracketed inside each other.
    ///
    /// # Errors
    ///
    /// Returns an error without calling `f` if the step cannot be started
    /// (see [`start_step()`](Self::start_step)).
    ///
    /// Returns [`Error::UnknownStep`] if `f` itself ended the step. The output of `f` is
    /// dropped in that case.
    ///
    /// A memory probe failure when the step ends is not an error here: the step is recorded
    /// with its memory delta marked as unavailable, a warning is logged and the output of `f`
    /// is returned. Use [`step()`](Self::step) and [`StepGuard::finish()`] to observe it.
    ///
    /// # Examples
    ///
    /// ```
    /// use step_tracker::Session;
    ///
    /// # fn main() -> Result<(), step_tracker::Error> {
    /// let session = Session::new();
    ///
    /// let parsed = session.bracket("parse", || "42".parse::<u32>())?;
    /// assert_eq!(parsed, Ok(42));
    ///
    /// let failed = session.bracket("parse", || "x".parse::<u32>())?;
    /// assert!(failed.is_err());
    ///
    /// // Both attempts were recorded.
    /// assert_eq!(session.steps().len(), 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn bracket<T>(&self, name: impl Into<String>, f: impl FnOnce() -> T) -> Result<T> {
        let guard = self.step(name)?;
        let output = f();

        match guard.finish() {
            // Already logged by end_step(), and the step is recorded without a memory delta.
            Ok(_) | Err(Error::Probe { .. }) => Ok(output),
            Err(e) => Err(e),
        }
    }

    /// Names of the steps that have been started but not yet ended.
    ///
    /// A non-empty set after all work is done indicates mismatched start/end calls.
    #[must_use]
    pub fn pending_steps(&self) -> BTreeSet<String> {
        self.state
            .lock()
            .expect(ERR_POISONED_LOCK)
            .open_steps
            .keys()
            .cloned()
            .collect()
    }

    /// A snapshot of the completed steps, in completion order.
    #[must_use]
    pub fn steps(&self) -> Vec<StepRecord> {
        self.state.lock().expect(ERR_POISONED_LOCK).steps.clone()
    }

    /// Whether no step has been completed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().expect(ERR_POISONED_LOCK).steps.is_empty()
    }

    /// The metadata the session was created with.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Wall-clock time at which the session was created.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time elapsed since the session was created, including time not covered by any step.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.origin)
    }

    /// Creates a report of all steps completed so far, stamped with the current time.
    ///
    /// Equivalent to `Report::build(self, Utc::now(), self.elapsed())`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`] if no step has been completed.
    pub fn to_report(&self) -> Result<Report> {
        Report::build(self, Utc::now(), self.elapsed())
    }

    /// Prints the report of this session to stdout.
    ///
    /// Prints nothing if no step has been completed.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        if let Ok(report) = self.to_report() {
            println!("{report}");
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_report() {
            Ok(report) => write!(f, "{report}"),
            Err(_) => writeln!(f, "no steps recorded"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);

        if !state.open_steps.is_empty() {
            let pending: BTreeSet<&String> = state.open_steps.keys().collect();
            warn!(?pending, "session dropped while steps were still open");
        }
    }
}
