//! Memory probe backed by the tracking allocator.

use crate::allocator::live_bytes_per_thread;
use crate::pal::abstractions::{MemoryProbe, MemoryReading};
use crate::ProbeError;

/// Reads the number of live heap bytes recorded by the tracking [`Allocator`](crate::Allocator).
///
/// The reading is a batch with one value per thread that has ever allocated, which sessions
/// reduce by summation. Works on every platform but requires the tracking allocator to be
/// installed as the global allocator; otherwise every reading fails with
/// [`ProbeError::Unsupported`].
///
/// # Examples
///
/// ```
/// use step_tracker::{Allocator, HeapMemoryProbe, Session};
///
/// #[global_allocator]
/// static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
///
/// # fn main() -> Result<(), step_tracker::Error> {
/// let session = Session::builder().memory_probe(HeapMemoryProbe).build();
///
/// let buffer = session.bracket("allocate", || vec![0_u8; 4096])?;
///
/// let record = &session.steps()[0];
/// assert!(record.memory_delta_bytes().expect("heap readings are available") >= 4096);
/// # drop(buffer);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapMemoryProbe;

impl MemoryProbe for HeapMemoryProbe {
    fn memory_used(&self) -> Result<MemoryReading, ProbeError> {
        live_bytes_per_thread()
            .map(MemoryReading::Batch)
            .ok_or(ProbeError::Unsupported {
                probe: "HeapMemoryProbe",
                reason: "the tracking allocator is not installed as the global allocator",
            })
    }
}
