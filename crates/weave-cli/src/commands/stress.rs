// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `weave stress`: fill the table, drain it, check every slot came back.

use std::cell::Cell;
use std::process;

use log::error;
use weave_rt::{CreateError, REAPER_SLOT};

use crate::output;

thread_local! {
    static RUNS: Cell<usize> = const { Cell::new(0) };
}

pub fn cmd_stress(workers: usize, rounds: usize) {
    println!("{}\n", output::banner("Stress"));

    if let Err(e) = weave_rt::init() {
        eprintln!("{}: {}", output::error_label(), e);
        process::exit(1);
    }

    let mut created = 0;
    let mut rejected = 0;
    let mut failures = 0;

    for round in 0..rounds {
        let mut round_created = 0;
        for i in 0..workers {
            match weave_rt::create(churn, round as i32, (i % 3) as i32 + 1) {
                Ok(_) => round_created += 1,
                Err(CreateError::CapacityExceeded { .. }) => rejected += 1,
                Err(e) => {
                    eprintln!("{}: {}", output::warning_label(), e);
                    failures += 1;
                }
            }
        }
        created += round_created;

        let mut yields = 0;
        loop {
            match weave_rt::yield_now() {
                Ok(0) => break,
                Ok(_) => yields += 1,
                Err(e) => {
                    eprintln!("{}: {}", output::error_label(), e);
                    eprintln!("\n{}", output::banner_fail("Stress", 1));
                    process::exit(1);
                }
            }
        }

        let stats = weave_rt::stats().unwrap_or_default();
        let drained = stats.active == 1 && stats.finished == 0 && stats.free == REAPER_SLOT - 1;
        let status = if drained {
            output::status_pass()
        } else {
            failures += 1;
            output::status_fail()
        };
        println!(
            "  {} round {}: {} created, {} main yield(s), {} slot(s) free",
            status,
            round + 1,
            output::count(round_created),
            yields + 1,
            output::count(stats.free)
        );
    }

    weave_rt::shutdown();

    let runs = RUNS.with(Cell::get);
    if runs != created {
        eprintln!(
            "{}: {} context(s) created but {} ran",
            output::error_label(),
            created,
            runs
        );
        failures += 1;
    }

    println!();
    println!(
        "{} context(s) created and reclaimed over {} round(s)",
        output::count(created),
        output::count(rounds)
    );
    if rejected > 0 {
        println!(
            "{}: {} request(s) past capacity were rejected",
            output::warning_label(),
            rejected
        );
    }

    if failures > 0 {
        eprintln!("\n{}", output::banner_fail("Stress", failures));
        process::exit(1);
    }
    println!("{}", output::banner_ok("Stress"));
}

fn churn(_round: i32, depth: i32) {
    RUNS.with(|r| r.set(r.get() + 1));
    for _ in 0..depth {
        if let Err(e) = weave_rt::yield_now() {
            error!("{}", e);
            return;
        }
    }
}
