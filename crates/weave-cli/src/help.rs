// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Help text for CLI commands.

use colored::Colorize;
use crate::output;

pub fn print_usage() {
    println!(
        "{} {} - Cooperative contexts on a single thread",
        output::title("Weave"),
        output::version(env!("CARGO_PKG_VERSION"))
    );
    println!();
    println!(
        "{}: {} {} {}",
        output::section_header("Usage"),
        output::command("weave"),
        output::arg("<command>"),
        output::arg("[args]")
    );
    println!();
    println!("{}", output::section_header("Commands:"));
    println!(
        "  {}                        Run two contexts to completion and show the interleaving",
        output::command("demo")
    );
    println!(
        "  {} {} Fill and drain the context table repeatedly",
        output::command("stress"),
        output::arg("[workers] [rounds]")
    );
    println!("  {}                        Show this help", output::command("help"));
    println!("  {}                     Show version", output::command("version"));
    println!();
    println!("{}", output::section_header("Environment:"));
    println!("  {}       Log filter (default: warn)", output::arg("RUST_LOG"));
    println!("  {}       Disable colored output", output::arg("NO_COLOR"));
    println!("  {}    Force colored output", output::arg("FORCE_COLOR"));
}

pub fn print_demo_help() {
    println!("{}", output::section_header("Demo"));
    println!();
    println!("Initialize the runtime, create two contexts, and yield from main");
    println!("until both have finished and been reclaimed by the reaper.");
    println!();
    println!(
        "{}: {} {}",
        "Usage".yellow(),
        output::command("weave"),
        output::command("demo")
    );
    println!();
    println!("Set {} to watch every switch.", "RUST_LOG=trace".cyan());
}

pub fn print_stress_help() {
    println!("{}", output::section_header("Stress"));
    println!();
    println!(
        "Create up to {} contexts per round, drain them, and check that",
        weave_rt::WORKER_CAPACITY
    );
    println!("the reaper returned every slot. Requests past capacity are reported.");
    println!();
    println!(
        "{}: {} {} {}",
        "Usage".yellow(),
        output::command("weave"),
        output::command("stress"),
        output::arg("[workers] [rounds]")
    );
    println!();
    println!("{}", output::section_header("Defaults:"));
    println!("  {}  {}", output::arg("workers"), weave_rt::WORKER_CAPACITY);
    println!("  {}   10", output::arg("rounds"));
}
