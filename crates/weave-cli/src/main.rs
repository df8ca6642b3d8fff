// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Weave CLI - drive the cooperative runtime from the command line.

use std::env;
use std::process;

mod commands;
mod help;
mod output;

fn main() {
    output::init();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        help::print_usage();
        return;
    }

    let wants_help = args.iter().skip(2).any(|a| a == "--help" || a == "-h");

    match args[1].as_str() {
        "demo" => {
            if wants_help {
                help::print_demo_help();
                return;
            }
            commands::demo::cmd_demo();
        }
        "stress" => {
            if wants_help {
                help::print_stress_help();
                return;
            }
            let workers = parse_count(args.get(2), "workers", weave_rt::WORKER_CAPACITY);
            let rounds = parse_count(args.get(3), "rounds", 10);
            commands::stress::cmd_stress(workers, rounds);
        }
        "help" | "--help" | "-h" => {
            help::print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("weave {}", env!("CARGO_PKG_VERSION"));
        }
        other => {
            eprintln!("{}: unknown command: {}", output::error_label(), other);
            help::print_usage();
            process::exit(1);
        }
    }
}

fn parse_count(arg: Option<&String>, name: &str, default: usize) -> usize {
    let Some(raw) = arg else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(n) => n,
        Err(_) => {
            eprintln!(
                "{}: {} must be a non-negative integer, got '{}'",
                output::error_label(),
                name,
                raw
            );
            process::exit(1);
        }
    }
}
