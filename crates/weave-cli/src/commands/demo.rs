// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `weave demo`: two contexts, main yields until both are reclaimed.

use std::process;

use log::error;
use weave_rt::MAIN_SLOT;

use crate::output;

pub fn cmd_demo() {
    println!("{}\n", output::banner("Demo"));

    if let Err(e) = weave_rt::init() {
        fail(&e.to_string());
    }

    let bodies: [(&str, fn(i32, i32), i32, i32); 2] =
        [("countdown", countdown, 1, 2), ("accumulate", accumulate, 3, 4)];
    for (name, entry, a, b) in bodies {
        match weave_rt::create(entry, a, b) {
            Ok(slot) => println!("{} created {}({}, {})", output::slot(slot), name, a, b),
            Err(e) => fail(&e.to_string()),
        }
    }
    println!();

    let mut yields = 0;
    loop {
        match weave_rt::yield_now() {
            Ok(left) => {
                yields += 1;
                println!(
                    "{} resumed, {} other context(s) active",
                    output::slot(MAIN_SLOT),
                    output::count(left)
                );
                if left == 0 {
                    break;
                }
            }
            Err(e) => fail(&e.to_string()),
        }
    }

    let free = weave_rt::stats().map_or(0, |s| s.free);
    weave_rt::shutdown();

    println!();
    println!(
        "main yielded {} time(s), {} slot(s) free after reclamation",
        output::count(yields),
        output::count(free)
    );
    println!("{}", output::banner_ok("Demo"));
}

fn here() -> usize {
    weave_rt::current_slot().unwrap_or(MAIN_SLOT)
}

/// Counts from `hi` down to `lo`, one step per turn.
fn countdown(lo: i32, hi: i32) {
    for n in (lo..=hi).rev() {
        println!("{} countdown {}", output::slot(here()), n);
        if let Err(e) = weave_rt::yield_now() {
            error!("{}", e);
            return;
        }
    }
    println!("{} countdown done", output::slot(here()));
}

/// Sums `lo..=hi`, one term per turn.
fn accumulate(lo: i32, hi: i32) {
    let mut total = 0;
    for n in lo..=hi {
        total += n;
        println!("{} accumulate +{} = {}", output::slot(here()), n, total);
        if let Err(e) = weave_rt::yield_now() {
            error!("{}", e);
            return;
        }
    }
    println!("{} accumulate done", output::slot(here()));
}

fn fail(msg: &str) -> ! {
    eprintln!("{}: {}", output::error_label(), msg);
    eprintln!("\n{}", output::banner_fail("Demo", 1));
    process::exit(1);
}
