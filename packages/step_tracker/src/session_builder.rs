use std::sync::Arc;

use crate::{Clock, MemoryProbe, Metadata, MetadataValue, Session, SystemClock};

/// Creates instances of [`Session`].
///
/// All parameters are optional:
/// * `metadata` - any number of key-value pairs describing the run (default: none)
/// * `clock` - source of timestamps (default: [`SystemClock`])
/// * `memory_probe` - source of memory readings (default: [`ResidentMemoryProbe`] on Linux,
///   none elsewhere)
///
/// Use `Session::builder()` to create a new instance of this builder.
///
/// # Examples
///
/// ```
/// use step_tracker::{HeapMemoryProbe, Session};
///
/// let session = Session::builder()
///     .metadata("script", "reindex")
///     .metadata("shards", 12)
///     .metadata("tags", vec!["nightly", "full"])
///     .memory_probe(HeapMemoryProbe)
///     .build();
///
/// assert_eq!(session.metadata().len(), 3);
/// ```
///
/// [`ResidentMemoryProbe`]: crate::ResidentMemoryProbe
#[derive(Debug)]
#[must_use]
pub struct SessionBuilder {
    metadata: Metadata,
    clock: Option<Arc<dyn Clock>>,
    memory_probe: MemoryProbeChoice,
}

#[derive(Debug)]
enum MemoryProbeChoice {
    PlatformDefault,
    Disabled,
    Custom(Arc<dyn MemoryProbe>),
}

impl SessionBuilder {
    pub(crate) fn new() -> Self {
        Self {
            metadata: Metadata::new(),
            clock: None,
            memory_probe: MemoryProbeChoice::PlatformDefault,
        }
    }

    /// Attaches a metadata entry to the session, replacing any previous value for the key.
    ///
    /// Metadata cannot be changed after the session is built.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the clock used to timestamp steps.
    pub fn clock(self, clock: impl Clock) -> Self {
        Self {
            clock: Some(Arc::new(clock)),
            ..self
        }
    }

    /// Sets the probe used to measure memory usage at the start and end of each step.
    pub fn memory_probe(self, memory_probe: impl MemoryProbe) -> Self {
        Self {
            memory_probe: MemoryProbeChoice::Custom(Arc::new(memory_probe)),
            ..self
        }
    }

    /// Disables memory measurements. Every step is recorded with an unavailable memory delta.
    pub fn without_memory_probe(self) -> Self {
        Self {
            memory_probe: MemoryProbeChoice::Disabled,
            ..self
        }
    }

    /// Creates the session and starts its overall timer.
    #[must_use]
    pub fn build(self) -> Session {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));

        let memory_probe = match self.memory_probe {
            MemoryProbeChoice::PlatformDefault => default_memory_probe(),
            MemoryProbeChoice::Disabled => None,
            MemoryProbeChoice::Custom(memory_probe) => Some(memory_probe),
        };

        Session::from_parts(self.metadata, clock, memory_probe)
    }
}

#[cfg(target_os = "linux")]
fn default_memory_probe() -> Option<Arc<dyn MemoryProbe>> {
    Some(Arc::new(crate::ResidentMemoryProbe))
}

#[cfg(not(target_os = "linux"))]
fn default_memory_probe() -> Option<Arc<dyn MemoryProbe>> {
    None
}
