#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Wall-clock and memory tracking of named program steps.
//!
//! This package measures how long explicitly bracketed steps of a program take and how much
//! the memory usage of the process changes while they run, then packages the measurements into
//! a renderer-agnostic [`Report`].
//!
//! The core functionality includes:
//! - [`Session`] - Owns the log of completed steps and the overall run timer
//! - [`StepGuard`] - Ends a step when dropped, even if the measured code panics
//! - [`StepRecord`] - The immutable measurement of one completed step
//! - [`summarize`] - Computes totals, averages and extrema over completed steps
//! - [`Report`] - Snapshot of summary statistics, per-step rows and run metadata
//! - [`Renderer`] and [`Writer`] - Turn a report into bytes and put them somewhere
//!
//! This is not a sampling profiler. Only the code you bracket is measured.
//!
//! # Simple usage
//!
//! ```
//! use std::thread;
//! use std::time::Duration;
//!
//! use step_tracker::Session;
//!
//! # fn main() -> Result<(), step_tracker::Error> {
//! let session = Session::builder()
//!     .metadata("script", "nightly_import")
//!     .metadata("author", "data team")
//!     .build();
//!
//! session.bracket("load", || thread::sleep(Duration::from_millis(10)))?;
//!
//! let rows = session.bracket("transform", || vec![1_u64, 2, 3].iter().sum::<u64>())?;
//! assert_eq!(rows, 6);
//!
//! let report = session.to_report()?;
//! assert_eq!(report.summary().step_count(), 2);
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! # Nested steps
//!
//! Steps with different names may overlap. A step is open at most once at a time.
//!
//! ```
//! use step_tracker::Session;
//!
//! # fn main() -> Result<(), step_tracker::Error> {
//! let session = Session::new();
//!
//! session.bracket("outer", || {
//!     session.bracket("inner", || {
//!         // Inner work.
//!     })
//! })??;
//!
//! // Steps are logged in completion order.
//! let names: Vec<_> = session.steps().iter().map(|s| s.name().to_owned()).collect();
//! assert_eq!(names, ["inner", "outer"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Manual start and end
//!
//! ```
//! use step_tracker::Session;
//!
//! # fn main() -> Result<(), step_tracker::Error> {
//! let session = Session::new();
//!
//! session.start_step("fetch")?;
//! // Work happens here.
//! let record = session.end_step("fetch")?;
//!
//! assert_eq!(record.name(), "fetch");
//! assert!(session.pending_steps().is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Memory measurements
//!
//! By default the resident set size of the process is sampled, which is available on Linux.
//! To measure heap usage on any platform, install the tracking [`Allocator`] and use
//! [`HeapMemoryProbe`]:
//!
//! ```
//! use step_tracker::{Allocator, HeapMemoryProbe, Session};
//!
//! #[global_allocator]
//! static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
//!
//! # fn main() {
//! let session = Session::builder().memory_probe(HeapMemoryProbe).build();
//! # }
//! ```
//!
//! # Logging
//!
//! Diagnostics are emitted through the `tracing` crate. The package never installs a subscriber.

mod allocator;
mod error;
mod format;
mod metadata;
mod pal;
mod render;
mod report;
mod session;
mod session_builder;
mod step_guard;
mod step_record;
mod summary;
mod writer;

pub use allocator::Allocator;
pub use error::*;
pub use metadata::{Metadata, MetadataValue};
pub use pal::{Clock, HeapMemoryProbe, MemoryProbe, MemoryReading, ResidentMemoryProbe, SystemClock};
pub use render::{JsonRenderer, Renderer, TextRenderer};
pub use report::{Report, ReportRow, ReportSummary};
pub use session::Session;
pub use session_builder::SessionBuilder;
pub use step_guard::StepGuard;
pub use step_record::StepRecord;
pub use summary::{Summary, summarize};
pub use writer::{FileWriter, Writer};

#[cfg(test)]
pub(crate) use render::MockRenderer;
#[cfg(test)]
pub(crate) use writer::MockWriter;

pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution is not safe because we can no longer ensure that we uphold security and privacy guarantees";
