use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when tracking steps or producing reports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A step was started while a step with the same name was still open.
    #[error("step '{name}' is already open")]
    DuplicateStep {
        /// Name of the step that was already open.
        name: String,
    },

    /// A step was ended that is not currently open. It was either never started
    /// or has already been ended.
    #[error("step '{name}' is not open")]
    UnknownStep {
        /// Name of the step the caller attempted to end.
        name: String,
    },

    /// Step names must contain at least one character.
    #[error("step name must not be empty")]
    EmptyStepName,

    /// A report was requested but no step has been completed yet.
    #[error("no completed steps to report on")]
    NoData,

    /// A memory probe failed to return a reading while starting or ending a step.
    ///
    /// If this is returned when ending a step, the step has still been closed and recorded,
    /// with its memory delta marked as unavailable.
    #[error("memory probe failed during step '{step}'")]
    Probe {
        /// Name of the step that was being started or ended.
        step: String,

        /// What went wrong with the probe.
        #[source]
        source: ProbeError,
    },

    /// A renderer failed to turn a report into its presentation format.
    #[error("failed to render report")]
    Render {
        /// The underlying failure, as reported by the renderer.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A writer failed to persist a rendered report.
    #[error("failed to write report to '{}'", .destination.display())]
    Write {
        /// Where the report was being written to.
        destination: PathBuf,

        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Errors reported by a [`MemoryProbe`](crate::MemoryProbe).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The probe cannot take readings in the current environment.
    #[error("{probe} is not supported here: {reason}")]
    Unsupported {
        /// Name of the probe that is not supported.
        probe: &'static str,

        /// Why the probe cannot work here.
        reason: &'static str,
    },

    /// The probe data source could not be read.
    #[error("failed to read memory usage")]
    Io {
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The probe data source was read but did not have the expected format.
    #[error("memory usage data is malformed: {detail}")]
    Malformed {
        /// A human-readable description of the problem.
        detail: String,
    },
}

/// A specialized `Result` type for step tracking operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
