use tracing::warn;

use crate::{Result, Session, StepRecord};

/// An open step that ends when the guard is dropped.
///
/// Created by [`Session::step()`]. Dropping the guard ends the step on every exit path,
/// including early returns and panics. Any error from ending the step on drop is logged.
/// Call [`finish()`](Self::finish) to end the step and receive its record or error instead.
///
/// # Examples
///
/// ```
/// use step_tracker::Session;
///
/// fn import(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
///     let _step = session.step("import")?;
///
///     // An early return still ends the step.
///     let count: u32 = "17".parse()?;
///     assert_eq!(count, 17);
///
///     Ok(())
/// }
///
/// let session = Session::new();
/// import(&session).unwrap();
/// assert_eq!(session.steps()[0].name(), "import");
/// ```
#[derive(Debug)]
#[must_use = "the step ends when the guard is dropped"]
pub struct StepGuard<'a> {
    session: &'a Session,

    // Taken when the step is ended, so that drop does not end it again.
    name: Option<String>,
}

impl<'a> StepGuard<'a> {
    pub(crate) fn new(session: &'a Session, name: String) -> Self {
        Self {
            session,
            name: Some(name),
        }
    }

    /// The name of the step.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .expect("name is only taken when the guard is consumed")
    }

    /// Ends the step and returns its record.
    ///
    /// # Errors
    ///
    /// Same as [`Session::end_step()`]. The step is no longer open after this returns,
    /// whatever the outcome.
    pub fn finish(mut self) -> Result<StepRecord> {
        let name = self
            .name
            .take()
            .expect("name is only taken when the guard is consumed");

        self.session.end_step(&name)
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        let Some(name) = self.name.take() else {
            return;
        };

        if let Err(e) = self.session.end_step(&name) {
            warn!(step = %name, error = %e, "failed to end step when guard was dropped");
        }
    }
}
