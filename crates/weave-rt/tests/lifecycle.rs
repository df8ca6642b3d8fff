// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Lifecycle tests for init/create/yield/finish and the reaper.
//! Each test drives the runtime on its own OS thread so it gets a fresh
//! thread-local scheduler.
//!
//! Context bodies run under `catch_unwind`, so a failed assertion inside one
//! is only logged. Bodies record what they see through `TRACE` or `expect_in_body`
//! and the test asserts from main.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;

use weave_rt::{
    ContextState, CreateError, InitError, RuntimeStats, MAIN_SLOT, REAPER_SLOT, WORKER_CAPACITY,
};

thread_local! {
    static TRACE: RefCell<Vec<(i32, i32)>> = const { RefCell::new(Vec::new()) };
    static BODY_FAILURES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Note a failed check inside a context body; `on_fresh_thread` reports it.
fn expect_in_body(ok: bool, what: impl Into<String>) {
    if !ok {
        BODY_FAILURES.with(|f| f.borrow_mut().push(what.into()));
    }
}

fn take_body_failures() -> Vec<String> {
    BODY_FAILURES.with(|f| f.take())
}

fn record(id: i32, turn: i32) {
    TRACE.with(|t| t.borrow_mut().push((id, turn)));
}

fn take_trace() -> Vec<(i32, i32)> {
    TRACE.with(|t| t.take())
}

/// Records one entry per turn and yields after each.
fn worker(id: i32, turns: i32) {
    for turn in 0..turns {
        record(id, turn);
        let yielded = weave_rt::yield_now();
        expect_in_body(yielded.is_ok(), format!("worker {} yield: {:?}", id, yielded));
    }
}

fn on_fresh_thread<R, F>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    thread::spawn(move || {
        let out = f();
        let failures = take_body_failures();
        assert!(failures.is_empty(), "context bodies failed: {:?}", failures);
        out
    })
    .join()
    .expect("runtime thread panicked")
}

/// Yield from main until nothing else is active; returns each yield result.
fn drain() -> Vec<usize> {
    let mut results = Vec::new();
    loop {
        let left = weave_rt::yield_now().unwrap();
        results.push(left);
        if left == 0 {
            return results;
        }
    }
}

fn idle_stats() -> RuntimeStats {
    RuntimeStats {
        active: 1,
        finished: 0,
        free: REAPER_SLOT - 1,
    }
}

#[test]
fn two_workers_interleave_then_drain() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        assert_eq!(weave_rt::create(worker, 1, 3).unwrap(), 1);
        assert_eq!(weave_rt::create(worker, 2, 2).unwrap(), 2);

        assert_eq!(drain(), vec![2, 2, 1, 0]);
        assert_eq!(take_trace(), vec![(1, 0), (2, 0), (1, 1), (2, 1), (1, 2)]);

        assert_eq!(weave_rt::slot_state(1), Some(ContextState::Free));
        assert_eq!(weave_rt::slot_state(2), Some(ContextState::Free));
        assert_eq!(weave_rt::yield_now().unwrap(), 0);
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
    });
}

#[test]
fn yield_alone_is_a_no_op() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        for _ in 0..3 {
            assert_eq!(weave_rt::yield_now().unwrap(), 0);
            assert_eq!(weave_rt::current_slot(), Some(MAIN_SLOT));
        }
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
    });
}

#[test]
fn capacity_is_table_minus_main_and_reaper() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        for i in 0..WORKER_CAPACITY {
            let slot = weave_rt::create(worker, i as i32, 1).unwrap();
            assert_eq!(slot, i + 1);
        }

        match weave_rt::create(worker, 99, 1) {
            Err(CreateError::CapacityExceeded { capacity }) => {
                assert_eq!(capacity, WORKER_CAPACITY)
            }
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
        let stats = weave_rt::stats().unwrap();
        assert_eq!(stats.active, WORKER_CAPACITY + 1);
        assert_eq!(stats.free, 0);
        assert_eq!(weave_rt::slot_state(REAPER_SLOT), Some(ContextState::Active));

        drain();
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
        assert_eq!(weave_rt::create(worker, 100, 0).unwrap(), 1);
    });
}

#[test]
fn each_worker_runs_once_per_round() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        for id in 1..=4 {
            weave_rt::create(worker, id, 3).unwrap();
        }

        let mut n = 0;
        loop {
            let left = weave_rt::yield_now().unwrap();
            record(0, n);
            n += 1;
            if left == 0 {
                break;
            }
        }

        let mut expected = Vec::new();
        for turn in 0..3 {
            for id in 1..=4 {
                expected.push((id, turn));
            }
            expected.push((0, turn));
        }
        // One main turn per worker exit after the last round.
        for n in 3..7 {
            expected.push((0, n));
        }
        assert_eq!(take_trace(), expected);
    });
}

#[test]
fn finished_slot_is_reclaimed_and_reused() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        let slot = weave_rt::create(worker, 7, 0).unwrap();
        assert_eq!(weave_rt::slot_state(slot), Some(ContextState::Active));

        assert_eq!(weave_rt::yield_now().unwrap(), 0);
        assert_eq!(weave_rt::slot_state(slot), Some(ContextState::Free));
        assert_eq!(weave_rt::current_slot(), Some(MAIN_SLOT));

        assert_eq!(weave_rt::create(worker, 8, 0).unwrap(), slot);
    });
}

#[test]
fn explicit_finish_stops_the_body() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let body_log = log.clone();
        weave_rt::spawn(move || {
            body_log.borrow_mut().push("start");
            let yielded = weave_rt::yield_now();
            expect_in_body(yielded.is_ok(), format!("yield: {:?}", yielded));
            body_log.borrow_mut().push("finishing");
            weave_rt::finish()
        })
        .unwrap();

        assert_eq!(weave_rt::yield_now().unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["start"]);
        assert_eq!(weave_rt::yield_now().unwrap(), 0);
        assert_eq!(*log.borrow(), vec!["start", "finishing"]);
        assert_eq!(weave_rt::slot_state(1), Some(ContextState::Free));
    });
}

#[test]
fn contexts_can_create_contexts() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        let child = Rc::new(Cell::new(None));
        let seen = child.clone();
        weave_rt::spawn(move || {
            seen.set(weave_rt::create(worker, 2, 1).ok());
            worker(1, 1);
        })
        .unwrap();

        drain();
        assert_eq!(child.get(), Some(2));
        assert_eq!(take_trace(), vec![(1, 0), (2, 0)]);
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
    });
}

#[test]
fn panicking_body_still_finishes() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        weave_rt::spawn(|| panic!("boom")).unwrap();
        weave_rt::create(worker, 5, 1).unwrap();

        drain();
        assert_eq!(take_trace(), vec![(5, 0)]);
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
    });
}

#[test]
fn failed_check_in_body_reaches_main() {
    let result = thread::spawn(|| {
        weave_rt::init().unwrap();
        weave_rt::spawn(|| {
            expect_in_body(false, "seen by main");
            assert_eq!(1, 2, "swallowed by the trampoline");
        })
        .unwrap();
        drain();
        // The body's own assert did not fail this thread.
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
        take_body_failures()
    })
    .join()
    .unwrap();
    assert_eq!(result, vec!["seen by main".to_string()]);
}

#[test]
fn replay_produces_identical_interleaving() {
    fn scenario() -> Vec<(i32, i32)> {
        weave_rt::init().unwrap();
        weave_rt::create(worker, 1, 4).unwrap();
        weave_rt::create(worker, 2, 1).unwrap();
        weave_rt::spawn(|| {
            let child = weave_rt::create(worker, 4, 2);
            expect_in_body(child.is_ok(), format!("nested create: {:?}", child));
            worker(3, 3);
        })
        .unwrap();
        drain();
        weave_rt::shutdown();
        take_trace()
    }

    let first = on_fresh_thread(scenario);
    let second = on_fresh_thread(scenario);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn init_twice_is_rejected() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        assert!(matches!(
            weave_rt::init(),
            Err(InitError::AlreadyInitialized)
        ));
    });
}

#[test]
fn shutdown_releases_and_allows_reinit() {
    on_fresh_thread(|| {
        weave_rt::init().unwrap();
        for id in 0..3 {
            weave_rt::create(worker, id, 5).unwrap();
        }
        // Leave everything suspended mid-body.
        assert_eq!(weave_rt::yield_now().unwrap(), 3);
        assert_eq!(weave_rt::stats().unwrap().active, 4);

        weave_rt::shutdown();
        assert!(!weave_rt::is_initialized());
        assert_eq!(weave_rt::current_slot(), None);
        assert_eq!(weave_rt::slot_state(1), None);

        weave_rt::init().unwrap();
        assert_eq!(weave_rt::yield_now().unwrap(), 0);
        assert_eq!(weave_rt::stats(), Some(idle_stats()));
    });
}

#[test]
fn finish_from_main_panics() {
    let result = thread::spawn(|| {
        weave_rt::init().unwrap();
        weave_rt::finish();
    })
    .join();
    assert!(result.is_err());
}

#[test]
#[should_panic(expected = "not initialized")]
fn create_before_init_panics() {
    let _ = weave_rt::create(worker, 0, 0);
}
