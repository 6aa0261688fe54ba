//! Allocation wrapper for tracking live heap bytes.

use std::alloc::{GlobalAlloc, Layout};
use std::cell::{Cell, OnceCell};
use std::fmt;
use std::sync::atomic::{self, AtomicBool, AtomicU64};
use std::sync::{Arc, LazyLock, Mutex};

use crate::ERR_POISONED_LOCK;

/// Per-thread counters updated on each allocation and deallocation. A global registry of all
/// counters (including those from threads that have since exited) allows summation for
/// process-wide readings without global contention.
#[derive(Debug)]
struct PerThreadCounters {
    allocated: AtomicU64,
    freed: AtomicU64,
}

impl PerThreadCounters {
    #[inline]
    const fn new() -> Self {
        Self {
            allocated: AtomicU64::new(0),
            freed: AtomicU64::new(0),
        }
    }

    #[inline]
    fn register_allocation(&self, bytes: u64) {
        // Relaxed is sufficient: we only need atomicity, not ordering w.r.t. other memory ops.
        self.allocated.fetch_add(bytes, atomic::Ordering::Relaxed);
    }

    #[inline]
    fn register_deallocation(&self, bytes: u64) {
        self.freed.fetch_add(bytes, atomic::Ordering::Relaxed);
    }

    /// Bytes allocated minus bytes freed on this thread. Negative if the thread freed
    /// memory that was allocated on another thread.
    #[inline]
    fn net_bytes(&self) -> i64 {
        let allocated = self.allocated.load(atomic::Ordering::Relaxed);
        let freed = self.freed.load(atomic::Ordering::Relaxed);

        #[expect(
            clippy::cast_possible_wrap,
            reason = "wrapping is the desired behavior for the two's complement difference"
        )]
        let net = allocated.wrapping_sub(freed) as i64;

        net
    }
}

// Global registry holding Arc references so counters outlive their threads.
static REGISTRY: LazyLock<Mutex<Vec<Arc<PerThreadCounters>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

// Set by the first tracked allocation. If it is never set, the tracking allocator is not
// installed as the global allocator and heap readings would be meaningless.
static INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    // We store a raw pointer to the per-thread counters rather than an Arc directly. Keeping an
    // Arc in TLS would run its Drop during thread teardown while the allocator is still in use,
    // re-entering the allocator at an unsafe point. The Arc itself lives in REGISTRY, which is
    // never cleared, so the pointer remains valid for the program lifetime.
    static TLS_COUNTER_PTR: OnceCell<*const PerThreadCounters> = const { OnceCell::new() };

    // Set while this thread's counters are being initialized. Initialization allocates, and
    // those allocations must not recurse into tracking.
    static TLS_INIT_GUARD: Cell<bool> = const { Cell::new(false) };
}

#[inline]
fn get_or_init_thread_counters() -> &'static PerThreadCounters {
    TLS_COUNTER_PTR.with(|cell| {
        if let Some(ptr) = cell.get() {
            // SAFETY: pointer originates from Arc stored in REGISTRY which retains ownership for program lifetime.
            return unsafe { &**ptr };
        }

        TLS_INIT_GUARD.set(true);

        let arc = Arc::new(PerThreadCounters::new());
        let ptr = Arc::as_ptr(&arc);
        REGISTRY.lock().expect(ERR_POISONED_LOCK).push(arc);
        _ = cell.set(ptr);

        TLS_INIT_GUARD.set(false);

        // SAFETY: pointer obtained from Arc::as_ptr for Arc stored in REGISTRY; lifetime extends for program duration.
        unsafe { &*ptr }
    })
}

/// Net live bytes per registered thread, or `None` if the tracking allocator is not installed.
pub(crate) fn live_bytes_per_thread() -> Option<Vec<i64>> {
    if !INSTALLED.load(atomic::Ordering::Relaxed) {
        return None;
    }

    // Collecting the readings allocates. The counters of this thread must exist before we
    // take the registry lock, or registering them from inside the allocator would deadlock.
    get_or_init_thread_counters();

    let registry = REGISTRY.lock().expect(ERR_POISONED_LOCK);
    Some(registry.iter().map(|counters| counters.net_bytes()).collect())
}

fn track_allocation(size: usize) {
    let size_u64: u64 = size.try_into().expect("usize always fits into u64");
    TLS_INIT_GUARD.with(|guard| {
        if guard.get() {
            return;
        }

        get_or_init_thread_counters().register_allocation(size_u64);
        INSTALLED.store(true, atomic::Ordering::Relaxed);
    });
}

fn track_deallocation(size: usize) {
    let size_u64: u64 = size.try_into().expect("usize always fits into u64");
    TLS_INIT_GUARD.with(|guard| {
        if guard.get() {
            return;
        }

        get_or_init_thread_counters().register_deallocation(size_u64);
    });
}

// Test helper for unit tests where we do not hook the global allocator.
#[cfg(test)]
pub(crate) fn register_fake_allocation(bytes: u64) {
    get_or_init_thread_counters().register_allocation(bytes);
    INSTALLED.store(true, atomic::Ordering::Relaxed);
}

/// A memory allocator that keeps count of the heap bytes currently in use.
///
/// This allocator wraps any [`GlobalAlloc`] implementation and forwards every call to it,
/// recording the size of each allocation and deallocation. Install it as the global allocator
/// to take readings with [`HeapMemoryProbe`](crate::HeapMemoryProbe).
///
/// # Examples
///
/// ```rust
/// use step_tracker::Allocator;
///
/// #[global_allocator]
/// static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
/// ```
pub struct Allocator<A: GlobalAlloc> {
    inner: A,
}

impl<A: GlobalAlloc> fmt::Debug for Allocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("inner", &"<allocator>")
            .finish()
    }
}

impl Allocator<std::alloc::System> {
    /// Creates a new tracking allocator using the system's default allocator.
    #[must_use]
    #[inline]
    pub const fn system() -> Self {
        Self {
            inner: std::alloc::System,
        }
    }
}

impl<A: GlobalAlloc> Allocator<A> {
    /// Creates a new tracking allocator that forwards to the provided allocator.
    #[must_use]
    #[inline]
    pub const fn new(allocator: A) -> Self {
        Self { inner: allocator }
    }
}

// SAFETY: We delegate all allocation operations to the underlying allocator,
// which already implements GlobalAlloc safely, while adding tracking functionality.
unsafe impl<A: GlobalAlloc> GlobalAlloc for Allocator<A> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let ptr = unsafe { self.inner.alloc(layout) };

        if !ptr.is_null() {
            track_allocation(layout.size());
        }

        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        track_deallocation(layout.size());

        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.dealloc(ptr, layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };

        if !ptr.is_null() {
            track_allocation(layout.size());
        }

        ptr
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };

        // On failure the original block is untouched, so nothing changes.
        if !new_ptr.is_null() {
            track_deallocation(layout.size());
            track_allocation(new_size);
        }

        new_ptr
    }
}
