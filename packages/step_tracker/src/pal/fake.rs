//! Fake clock and memory probe for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pal::abstractions::{Clock, MemoryProbe, MemoryReading};
use crate::ProbeError;

/// Fake clock whose time only moves when a test says so.
///
/// Clones share the same underlying time, so a test can keep one clone and hand
/// another to a session, then advance time while steps are open.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeClock {
    now: Arc<Mutex<Duration>>,
}

impl FakeClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self
            .now
            .lock()
            .expect("FakeClock state lock should not be poisoned");

        *now = now.checked_add(by).expect("fake time never overflows in tests");
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        *self
            .now
            .lock()
            .expect("FakeClock state lock should not be poisoned")
    }
}

#[derive(Debug)]
enum FakeMemoryState {
    Reading(MemoryReading),
    Failing,
}

/// Fake memory probe that returns whatever reading the test last set.
///
/// Clones share the same underlying state.
#[derive(Clone, Debug)]
pub(crate) struct FakeMemoryProbe {
    state: Arc<Mutex<FakeMemoryState>>,
}

impl FakeMemoryProbe {
    /// Creates a probe that reads zero bytes.
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeMemoryState::Reading(MemoryReading::Bytes(0)))),
        }
    }

    pub(crate) fn set_bytes(&self, bytes: u64) {
        self.set_reading(MemoryReading::Bytes(bytes));
    }

    pub(crate) fn set_reading(&self, reading: MemoryReading) {
        *self
            .state
            .lock()
            .expect("FakeMemoryProbe state lock should not be poisoned") =
            FakeMemoryState::Reading(reading);
    }

    /// Makes every following reading fail until a new reading is set.
    pub(crate) fn fail(&self) {
        *self
            .state
            .lock()
            .expect("FakeMemoryProbe state lock should not be poisoned") = FakeMemoryState::Failing;
    }
}

impl MemoryProbe for FakeMemoryProbe {
    fn memory_used(&self) -> Result<MemoryReading, ProbeError> {
        match &*self
            .state
            .lock()
            .expect("FakeMemoryProbe state lock should not be poisoned")
        {
            FakeMemoryState::Reading(reading) => Ok(reading.clone()),
            FakeMemoryState::Failing => Err(ProbeError::Unsupported {
                probe: "FakeMemoryProbe",
                reason: "configured to fail",
            }),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_zero() {
        assert_eq!(FakeClock::new().now(), Duration::ZERO);
    }

    #[test]
    fn clock_clones_share_time() {
        let clock1 = FakeClock::new();
        let clock2 = clock1.clone();

        clock1.advance(Duration::from_millis(150));
        assert_eq!(clock2.now(), Duration::from_millis(150));
    }

    #[test]
    fn probe_clones_share_state() {
        let probe1 = FakeMemoryProbe::new();
        let probe2 = probe1.clone();

        probe1.set_bytes(2048);
        assert_eq!(
            probe2.memory_used().expect("probe is not failing").total(),
            2048
        );

        probe2.fail();
        assert!(probe1.memory_used().is_err());
    }
}
