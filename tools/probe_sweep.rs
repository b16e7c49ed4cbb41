// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sweep a simulated electrode along a straight line and report streaming
//! and spiking statistics.
//!
//! ```text
//! probe_sweep [--config <path>] [--from a,d,l] [--to a,d,l] [--steps N]
//!             [--ticks-per-step N] [--wheel V] [--set key=value]... [--json]
//!             [--debug-<crate>] [--debug-all]
//! ```

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use probesim::atlas::VoxelCoord;
use probesim::config::{apply_cli_overrides, apply_environment_overrides, load_config, ProbesimConfig};
use probesim::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingOptions};
use probesim::streaming::ClientId;
use probesim::ProbeRuntime;
use serde::Serialize;
use tracing::{info, warn};

struct SweepArgs {
    config: Option<PathBuf>,
    from: VoxelCoord,
    to: VoxelCoord,
    steps: u32,
    ticks_per_step: u32,
    wheel: f32,
    overrides: HashMap<String, String>,
    json: bool,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: probe_sweep [--config <path>] [--from a,d,l] [--to a,d,l] [--steps N]\n\
         \x20                  [--ticks-per-step N] [--wheel V] [--set key=value]... [--json]\n\n\
         Override keys: data_dir, log_level, seed, density, radius, tick_hz\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_voxel(raw: &str) -> Result<VoxelCoord> {
    let parts: Vec<i32> = raw
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid voxel '{raw}'"))?;
    match parts.as_slice() {
        [ap, dv, lr] => Ok(VoxelCoord::new(*ap, *dv, *lr)),
        _ => bail!("voxel '{raw}' needs three components"),
    }
}

fn parse_args() -> Result<SweepArgs> {
    let mut parsed = SweepArgs {
        config: None,
        from: VoxelCoord::new(216, 40, 228),
        to: VoxelCoord::new(216, 200, 228),
        steps: 40,
        ticks_per_step: 6,
        wheel: 0.0,
        overrides: HashMap::new(),
        json: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = || args.next().unwrap_or_else(|| usage_and_exit());
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value())),
            "--from" => parsed.from = parse_voxel(&value())?,
            "--to" => parsed.to = parse_voxel(&value())?,
            "--steps" => parsed.steps = value().parse().context("--steps")?,
            "--ticks-per-step" => parsed.ticks_per_step = value().parse().context("--ticks-per-step")?,
            "--wheel" => parsed.wheel = value().parse().context("--wheel")?,
            "--set" => {
                let pair = value();
                let Some((key, val)) = pair.split_once('=') else {
                    bail!("--set expects key=value, got '{pair}'");
                };
                parsed.overrides.insert(key.to_string(), val.to_string());
            }
            "--json" => parsed.json = true,
            "-h" | "--help" => usage_and_exit(),
            flag if flag.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }
    Ok(parsed)
}

/// Returns the config and, when defaults were used, why.
fn load(args: &SweepArgs) -> Result<(ProbesimConfig, Option<String>)> {
    match load_config(args.config.as_deref(), Some(&args.overrides)) {
        Ok(config) => Ok((config, None)),
        Err(e) if args.config.is_none() => {
            let mut config = ProbesimConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, &args.overrides);
            Ok((config, Some(e.to_string())))
        }
        Err(e) => Err(e).context("loading configuration"),
    }
}

fn lerp(from: VoxelCoord, to: VoxelCoord, t: f32) -> VoxelCoord {
    let mix = |a: i32, b: i32| (a as f32 + (b - a) as f32 * t).round() as i32;
    VoxelCoord::new(mix(from.ap, to.ap), mix(from.dv, to.dv), mix(from.lr, to.lr))
}

#[derive(Serialize)]
struct SweepReport {
    steps: u32,
    ticks: u64,
    neurons: usize,
    spikes: usize,
    oracle_neurons: u64,
    client: probesim::streaming::StreamingDiagnostics,
    server: probesim::streaming::ServerDiagnostics,
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let flags = parse_debug_flags();
    let (config, fallback) = load(&args)?;
    let _guard = init_logging(
        &flags,
        &LoggingOptions {
            default_level: config.system.log_level.clone(),
            ..Default::default()
        },
    )?;
    for name in flags.unknown_crates() {
        warn!(crate_name = %name, "Unknown crate in debug flags, ignored");
    }
    if let Some(reason) = fallback {
        warn!(reason = %reason, "No configuration file, using defaults");
    }

    let runtime = ProbeRuntime::from_config(config)?;
    let mut session = runtime.open_session(ClientId(1));
    session.set_signals(args.wheel, 0, 0);
    session.start_trial();

    let mut spikes = 0usize;
    let mut ticks = 0u64;
    let steps = args.steps.max(1);
    for step in 0..=steps {
        let tip = lerp(args.from, args.to, step as f32 / steps as f32);
        if let Err(e) = session.move_tip(tip) {
            warn!(%tip, error = %e, "Tip request failed");
        }
        for _ in 0..args.ticks_per_step {
            let tick = session.tick();
            spikes += tick.stats.spikes;
            ticks += 1;
        }
        info!(step, %tip, neurons = session.population().len(), "Sweep step");
    }

    // Let the last responses land
    let tick = session.tick();
    spikes += tick.stats.spikes;
    ticks += 1;

    let report = SweepReport {
        steps,
        ticks,
        neurons: session.population().len(),
        spikes,
        oracle_neurons: runtime.server().oracle().neuron_count(),
        client: session.diagnostics(),
        server: runtime.server().diagnostics(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("steps:            {}", report.steps);
        println!("ticks:            {}", report.ticks);
        println!("neurons spawned:  {}", report.neurons);
        println!("spikes:           {}", report.spikes);
        println!("oracle neurons:   {}", report.oracle_neurons);
        println!("client:           {:?}", report.client);
        println!("server:           {:?}", report.server);
    }
    Ok(())
}
