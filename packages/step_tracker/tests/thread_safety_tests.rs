//! Thread safety integration tests for `step_tracker`.
//!
//! These tests verify that sessions can be shared and moved between threads and that
//! concurrent steps are all recorded.

use std::sync::Arc;
use std::thread;

use step_tracker::{Report, Session};

#[test]
fn session_can_be_moved_between_threads() {
    let session = Session::builder().without_memory_probe().build();

    let handle = thread::spawn(move || {
        session
            .bracket("cross_thread_work", || {
                let mut sum = 0;
                for i in 0..1000 {
                    sum += i;
                }
                std::hint::black_box(sum);
            })
            .unwrap();

        session.to_report()
    });

    let report = handle.join().unwrap().unwrap();
    assert_eq!(report.summary().step_count(), 1);
}

#[test]
fn session_can_be_shared_between_threads() {
    const THREADS: usize = 8;
    const STEPS_PER_THREAD: usize = 25;

    let session = Arc::new(Session::builder().without_memory_probe().build());

    let handles: Vec<_> = (0..THREADS)
        .map(|thread_index| {
            let session = Arc::clone(&session);

            thread::spawn(move || {
                for step_index in 0..STEPS_PER_THREAD {
                    session
                        .bracket(format!("t{thread_index}_s{step_index}"), || {
                            std::hint::black_box(step_index)
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(session.steps().len(), THREADS * STEPS_PER_THREAD);
    assert!(session.pending_steps().is_empty());
}

#[test]
fn same_name_cannot_be_open_on_two_threads() {
    let session = Session::builder().without_memory_probe().build();

    let _guard = session.step("exclusive").unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            assert!(session.start_step("exclusive").is_err());
        });
    });
}

#[test]
fn report_can_be_shared_across_threads() {
    let session = Session::builder().without_memory_probe().build();
    session.bracket("work", || ()).unwrap();

    let report: Arc<Report> = Arc::new(session.to_report().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let report = Arc::clone(&report);
            thread::spawn(move || report.rows().len())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}
