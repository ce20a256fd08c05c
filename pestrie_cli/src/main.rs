// Copyright 2025 the pestrie-rs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `pestrie-query`: loads a binary PesTrie index and answers alias/
//! points-to queries against it, either replaying a query-plan file or
//! issuing randomized queries in simulation mode.

mod cli;
mod driver;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::cli::Args;
use crate::driver::{check_compatible, run_plan, run_simulation};

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let load_start = Instant::now();
    let index = match pestrie_loader::load(&args.input) {
        Ok(index) => index,
        Err(err) => {
            log::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("index load took {:?}", load_start.elapsed());

    if let Err(err) = check_compatible(args.query_type, index.kind()) {
        log::error!("{err}");
        return ExitCode::SUCCESS;
    }

    let query_start = Instant::now();
    let report = match &args.query_plan {
        Some(plan_path) => match run_plan(&index, args.query_type, plan_path, args.print_answers) {
            Ok(report) => report,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::SUCCESS;
            }
        },
        None => {
            let seed = args.seed.unwrap_or_else(default_seed);
            run_simulation(
                &index,
                args.query_type,
                args.n_query,
                seed,
                args.print_answers,
            )
        }
    };
    log::info!(
        "query phase took {:?}, {} queries run, {} out-of-range plan entries skipped",
        query_start.elapsed(),
        report.queries_run,
        report.out_of_range_observations,
    );

    if args.do_profile {
        print_profile(&index);
    }

    ExitCode::SUCCESS
}

/// Time-derived fallback seed for simulation mode when `--seed` is absent,
/// matching the reference builder's `time(NULL)` reseed (distilled spec's
/// Open Questions) while keeping the seed overridable for reproducible
/// runs.
#[allow(
    clippy::cast_possible_truncation,
    reason = "low bits of a nanosecond timestamp are an adequate simulation seed"
)]
fn default_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn print_profile(index: &pestrie_core::Index) {
    let profile = index.profile();
    println!("Trees = {}, Nodes = {}", profile.tree_count, profile.vertex_num - 1);
    println!(
        "kind={:?} n={} m={} live_shapes={} same_tree_hits={}",
        profile.kind, profile.n, profile.m, profile.live_shapes, profile.same_tree_hits
    );
    let bs = profile.bucket_stats;
    println!(
        "columns: non_empty={} total_shape_refs={} max_bucket_len={}",
        bs.non_empty_columns, bs.total_shape_refs, bs.max_bucket_len
    );
}
