//! Renderer-agnostic step tracking reports.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::trace;

use crate::{Metadata, Renderer, Result, Session, StepRecord, Summary, Writer, format, summarize};

/// Snapshot of the steps recorded by a [`Session`], ready to be rendered.
///
/// A report contains summary statistics, one row per completed step (in completion order)
/// and the session metadata. It is independent of the session it was created from:
/// later activity in the session does not affect it.
///
/// For human-readable output, use the `Display` implementation, which renders a plain ASCII
/// table. For other formats, pass the report to a [`Renderer`]. For programmatic access,
/// inspect the report via the provided methods.
///
/// # Examples
///
/// ```
/// use step_tracker::Session;
///
/// # fn main() -> Result<(), step_tracker::Error> {
/// let session = Session::builder().metadata("job", "resize_images").build();
/// session.bracket("decode", || ())?;
/// session.bracket("encode", || ())?;
///
/// let report = session.to_report()?;
///
/// for row in report.rows() {
///     println!("{}: {} ({})", row.name(), row.duration(), row.memory_delta());
/// }
///
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    generated_at: DateTime<Utc>,
    session_started_at: DateTime<Utc>,
    metadata: Metadata,
    summary: ReportSummary,
    rows: Vec<ReportRow>,

    // From session start to report creation, including time not covered by any step.
    total_elapsed_seconds: f64,
    total_elapsed: String,
}

/// Summary statistics of a [`Report`], as raw values and formatted for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportSummary {
    step_count: usize,
    total_duration_seconds: f64,
    total_duration: String,
    average_duration_seconds: f64,
    average_duration: String,
    max_duration_seconds: f64,
    max_duration: String,
    max_duration_step_name: String,
    peak_memory_bytes: Option<i64>,
    peak_memory: String,
}

/// One completed step in a [`Report`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    name: String,
    started_at_seconds: f64,
    ended_at_seconds: f64,
    duration_seconds: f64,
    duration: String,
    memory_delta_bytes: Option<i64>,
    memory_delta: String,
    share_of_total_percent: f64,
}

impl Report {
    /// Creates a report of all steps the session has completed so far.
    ///
    /// `generated_at` is the wall-clock time the report is stamped with. `elapsed` is the
    /// session time at report generation, usually taken from [`Session::elapsed()`]. The
    /// report is a function of these inputs and the completed steps only, so building it
    /// twice with the same inputs from an unchanged session yields equal reports.
    ///
    /// Open steps are not included. The session is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`](crate::Error::NoData) if the session has no completed steps.
    /// No partial or empty report is ever produced.
    pub fn build(
        session: &Session,
        generated_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Result<Self> {
        let steps = session.steps();
        let summary = summarize(&steps)?;

        let total = summary.total_duration();
        let rows = steps.iter().map(|step| ReportRow::new(step, total)).collect();

        trace!(steps = steps.len(), "report built");

        Ok(Self {
            generated_at,
            session_started_at: session.started_at(),
            metadata: session.metadata().clone(),
            summary: ReportSummary::new(&summary),
            rows,
            total_elapsed_seconds: elapsed.as_secs_f64(),
            total_elapsed: format::seconds(elapsed),
        })
    }

    /// When the report was generated.
    #[must_use]
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// When the session that produced the report was created.
    #[must_use]
    pub fn session_started_at(&self) -> DateTime<Utc> {
        self.session_started_at
    }

    /// The metadata of the session.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Summary statistics over all rows.
    #[must_use]
    pub fn summary(&self) -> &ReportSummary {
        &self.summary
    }

    /// One row per completed step, in completion order.
    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Time from the start of the session to the creation of the report, in seconds.
    ///
    /// Unlike the total step duration, this includes time spent outside of any step.
    #[must_use]
    pub fn total_elapsed_seconds(&self) -> f64 {
        self.total_elapsed_seconds
    }

    /// The total elapsed time formatted with two decimal places.
    #[must_use]
    pub fn total_elapsed(&self) -> &str {
        &self.total_elapsed
    }

    /// Renders the report and hands the result to a writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`](crate::Error::Render) or [`Error::Write`](crate::Error::Write)
    /// if either collaborator fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use step_tracker::{FileWriter, JsonRenderer, Session};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::new();
    /// session.bracket("work", || ())?;
    ///
    /// let dir = tempfile::tempdir()?;
    /// let path = dir.path().join("report.json");
    ///
    /// session
    ///     .to_report()?
    ///     .render_to(&JsonRenderer::pretty(), &FileWriter, &path)?;
    ///
    /// assert!(path.exists());
    /// # Ok(())
    /// # }
    /// ```
    pub fn render_to(
        &self,
        renderer: &dyn Renderer,
        writer: &dyn Writer,
        destination: &Path,
    ) -> Result<()> {
        let bytes = renderer.render(self)?;
        writer.write(&bytes, destination)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Step report generated {}",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;

        for (key, value) in &self.metadata {
            writeln!(f, "  {key}: {value}")?;
        }

        writeln!(f)?;

        let name_width = self
            .rows
            .iter()
            .map(|row| row.name.chars().count())
            .chain(std::iter::once("step".len()))
            .max()
            .unwrap_or_default();

        writeln!(
            f,
            "{:<name_width$} | {:>10} | {:>10} | {:>12} | {:>7}",
            "step", "start", "duration", "memory", "share"
        )?;
        writeln!(f, "{}", "-".repeat(name_width.saturating_add(52)))?;

        for row in &self.rows {
            writeln!(
                f,
                "{:<name_width$} | {:>10} | {:>10} | {:>12} | {:>6.1}%",
                row.name,
                format!("{:.2} s", row.started_at_seconds),
                row.duration,
                row.memory_delta,
                row.share_of_total_percent
            )?;
        }

        writeln!(f)?;

        let summary = &self.summary;
        writeln!(f, "steps:         {}", summary.step_count)?;
        writeln!(f, "total:         {}", summary.total_duration)?;
        writeln!(f, "average:       {}", summary.average_duration)?;
        writeln!(
            f,
            "longest:       {} ({})",
            summary.max_duration_step_name, summary.max_duration
        )?;
        writeln!(f, "peak memory:   {}", summary.peak_memory)?;
        writeln!(f, "elapsed:       {}", self.total_elapsed)?;

        Ok(())
    }
}

impl ReportSummary {
    fn new(summary: &Summary) -> Self {
        Self {
            step_count: summary.step_count(),
            total_duration_seconds: summary.total_duration().as_secs_f64(),
            total_duration: format::seconds(summary.total_duration()),
            average_duration_seconds: summary.average_duration().as_secs_f64(),
            average_duration: format::seconds(summary.average_duration()),
            max_duration_seconds: summary.max_duration().as_secs_f64(),
            max_duration: format::seconds(summary.max_duration()),
            max_duration_step_name: summary.max_duration_step_name().to_owned(),
            peak_memory_bytes: summary.peak_memory_bytes(),
            peak_memory: format::optional_bytes(summary.peak_memory_bytes()),
        }
    }

    /// Number of completed steps in the report.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Sum of all step durations, in seconds.
    #[must_use]
    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    /// Sum of all step durations, formatted with two decimal places.
    #[must_use]
    pub fn total_duration(&self) -> &str {
        &self.total_duration
    }

    /// Mean step duration, in seconds.
    #[must_use]
    pub fn average_duration_seconds(&self) -> f64 {
        self.average_duration_seconds
    }

    /// Mean step duration, formatted with two decimal places.
    #[must_use]
    pub fn average_duration(&self) -> &str {
        &self.average_duration
    }

    /// Duration of the longest step, in seconds.
    #[must_use]
    pub fn max_duration_seconds(&self) -> f64 {
        self.max_duration_seconds
    }

    /// Duration of the longest step, formatted with two decimal places.
    #[must_use]
    pub fn max_duration(&self) -> &str {
        &self.max_duration
    }

    /// Name of the longest step (the first one, if there is a tie).
    #[must_use]
    pub fn max_duration_step_name(&self) -> &str {
        &self.max_duration_step_name
    }

    /// The largest memory delta of any single step, if any step has one.
    #[must_use]
    pub fn peak_memory_bytes(&self) -> Option<i64> {
        self.peak_memory_bytes
    }

    /// The peak memory delta in base-1024 units, or `n/a`.
    #[must_use]
    pub fn peak_memory(&self) -> &str {
        &self.peak_memory
    }
}

impl ReportRow {
    fn new(step: &StepRecord, total_duration: Duration) -> Self {
        let share_of_total_percent = if total_duration.is_zero() {
            0.0
        } else {
            step.duration().as_secs_f64() / total_duration.as_secs_f64() * 100.0
        };

        Self {
            name: step.name().to_owned(),
            started_at_seconds: step.started_at().as_secs_f64(),
            ended_at_seconds: step.ended_at().as_secs_f64(),
            duration_seconds: step.duration_seconds(),
            duration: step.duration_human(),
            memory_delta_bytes: step.memory_delta_bytes(),
            memory_delta: step.memory_delta_human(),
            share_of_total_percent,
        }
    }

    /// Name of the step.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the step started, in seconds from the start of the session.
    #[must_use]
    pub fn started_at_seconds(&self) -> f64 {
        self.started_at_seconds
    }

    /// When the step ended, in seconds from the start of the session.
    #[must_use]
    pub fn ended_at_seconds(&self) -> f64 {
        self.ended_at_seconds
    }

    /// Duration of the step, in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Duration of the step, formatted with two decimal places.
    #[must_use]
    pub fn duration(&self) -> &str {
        &self.duration
    }

    /// Memory delta of the step in bytes, if it was measured.
    #[must_use]
    pub fn memory_delta_bytes(&self) -> Option<i64> {
        self.memory_delta_bytes
    }

    /// Memory delta of the step in base-1024 units, or `n/a`.
    #[must_use]
    pub fn memory_delta(&self) -> &str {
        &self.memory_delta
    }

    /// The share of the summed step durations taken by this step, from 0 to 100.
    #[must_use]
    pub fn share_of_total_percent(&self) -> f64 {
        self.share_of_total_percent
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::path::PathBuf;
    use std::thread;

    use chrono::TimeZone;

    use super::*;
    use crate::pal::{FakeClock, FakeMemoryProbe};
    use crate::{Error, MockRenderer, MockWriter};

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn create_test_session() -> (Session, FakeClock, FakeMemoryProbe) {
        let clock = FakeClock::new();
        let memory = FakeMemoryProbe::new();

        let session = Session::builder()
            .metadata("script", "pipeline")
            .clock(clock.clone())
            .memory_probe(memory.clone())
            .build();

        (session, clock, memory)
    }

    fn record_steps(session: &Session, clock: &FakeClock, memory: &FakeMemoryProbe) {
        memory.set_bytes(0);
        session
            .bracket("load", || {
                clock.advance(Duration::from_millis(1000));
                memory.set_bytes(2 * 1024 * 1024);
            })
            .expect("step is not open");

        clock.advance(Duration::from_millis(500));

        session
            .bracket("transform", || {
                clock.advance(Duration::from_millis(3000));
                memory.set_bytes(1024 * 1024);
            })
            .expect("step is not open");
    }

    #[test]
    fn empty_session_is_no_data() {
        let (session, _, _) = create_test_session();

        assert!(matches!(
            Report::build(&session, generated_at(), session.elapsed()),
            Err(Error::NoData)
        ));
    }

    #[test]
    fn report_contains_rows_summary_and_metadata() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);

        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        assert_eq!(report.generated_at(), generated_at());
        assert_eq!(report.metadata().len(), 1);

        let names: Vec<_> = report.rows().iter().map(ReportRow::name).collect();
        assert_eq!(names, ["load", "transform"]);

        let load = &report.rows()[0];
        assert_eq!(load.duration(), "1.00 s");
        assert_eq!(load.memory_delta(), "2.00 MB");
        assert_eq!(load.share_of_total_percent(), 25.0);

        let transform = &report.rows()[1];
        assert_eq!(transform.started_at_seconds(), 1.5);
        assert_eq!(transform.ended_at_seconds(), 4.5);
        assert_eq!(transform.memory_delta_bytes(), Some(-1024 * 1024));
        assert_eq!(transform.memory_delta(), "-1.00 MB");

        let summary = report.summary();
        assert_eq!(summary.step_count(), 2);
        assert_eq!(summary.total_duration(), "4.00 s");
        assert_eq!(summary.average_duration(), "2.00 s");
        assert_eq!(summary.max_duration_step_name(), "transform");
        assert_eq!(summary.peak_memory(), "2.00 MB");
    }

    #[test]
    fn total_elapsed_includes_unbracketed_time() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);
        clock.advance(Duration::from_millis(500));

        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        assert_eq!(report.summary().total_duration_seconds(), 4.0);
        assert_eq!(report.total_elapsed_seconds(), 5.0);
        assert_eq!(report.total_elapsed(), "5.00 s");
    }

    #[test]
    fn building_twice_yields_identical_reports() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);

        let first = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");
        let second = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        assert_eq!(first, second);
    }

    #[test]
    fn building_twice_with_system_clock_yields_identical_reports() {
        let session = Session::builder().without_memory_probe().build();
        session.bracket("work", || ()).expect("step is not open");

        let elapsed = session.elapsed();
        let first =
            Report::build(&session, generated_at(), elapsed).expect("session has steps");
        thread::sleep(Duration::from_millis(20));
        let second =
            Report::build(&session, generated_at(), elapsed).expect("session has steps");

        assert_eq!(first, second);
        assert_eq!(first.total_elapsed_seconds(), elapsed.as_secs_f64());
    }

    #[test]
    fn total_elapsed_is_taken_from_input() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);
        clock.advance(Duration::from_secs(60));

        let report = Report::build(&session, generated_at(), Duration::from_secs(10))
            .expect("session has steps");

        assert_eq!(report.total_elapsed(), "10.00 s");
    }

    #[test]
    fn report_is_not_affected_by_later_steps() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);

        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");
        session.bracket("later", || ()).expect("step is not open");

        assert_eq!(report.rows().len(), 2);
        assert_eq!(session.steps().len(), 3);
    }

    #[test]
    fn open_steps_are_not_reported() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);
        session.start_step("unfinished").expect("step is not open");

        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        assert!(report.rows().iter().all(|row| row.name() != "unfinished"));
        assert_eq!(session.pending_steps().len(), 1);
    }

    #[test]
    fn zero_length_steps_have_zero_share() {
        let (session, _, _) = create_test_session();
        session.bracket("instant", || ()).expect("step is not open");

        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        assert_eq!(report.rows()[0].share_of_total_percent(), 0.0);
    }

    #[test]
    fn display_renders_table() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);

        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");
        let text = report.to_string();

        assert!(text.contains("2024-05-01T12:00:00Z"));
        assert!(text.contains("script: pipeline"));
        assert!(text.contains("transform"));
        assert!(text.contains("longest:       transform (3.00 s)"));
        assert!(text.contains("elapsed:       4.50 s"));
    }

    #[test]
    fn render_to_passes_rendered_bytes_to_writer() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);
        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .once()
            .returning(|_| Ok(b"rendered".to_vec()));

        let mut writer = MockWriter::new();
        writer
            .expect_write()
            .once()
            .withf(|bytes, destination| {
                bytes == b"rendered" && destination == Path::new("out/report.txt")
            })
            .returning(|_, _| Ok(()));

        report
            .render_to(&renderer, &writer, Path::new("out/report.txt"))
            .expect("mocks succeed");
    }

    #[test]
    fn render_failure_skips_writer() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);
        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        let mut renderer = MockRenderer::new();
        renderer.expect_render().once().returning(|_| {
            Err(Error::Render {
                source: "template missing".into(),
            })
        });

        let mut writer = MockWriter::new();
        writer.expect_write().never();

        let result = report.render_to(&renderer, &writer, Path::new("out/report.txt"));

        assert!(matches!(result, Err(Error::Render { .. })));
    }

    #[test]
    fn write_failure_leaves_session_intact() {
        let (session, clock, memory) = create_test_session();
        record_steps(&session, &clock, &memory);
        let report = Report::build(&session, generated_at(), session.elapsed())
            .expect("session has steps");

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .returning(|_| Ok(Vec::new()));

        let mut writer = MockWriter::new();
        writer.expect_write().returning(|_, destination| {
            Err(Error::Write {
                destination: PathBuf::from(destination),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });

        let result = report.render_to(&renderer, &writer, Path::new("/read-only/report"));

        assert!(matches!(result, Err(Error::Write { .. })));
        assert_eq!(session.steps().len(), 2);
        assert!(session.pending_steps().is_empty());
    }

    static_assertions::assert_impl_all!(Report: Send, Sync);
}
