// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-crate debug switches.
//!
//! `--debug-probesim-atlas` on the command line, or `PROBESIM_DEBUG=probesim-atlas`
//! in the environment, raises `probesim_atlas` to debug. Names are stored in
//! tracing target form (underscores), so `probesim-atlas` and `probesim_atlas`
//! are the same switch.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Crates selected for debug output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    targets: BTreeSet<String>,
    /// Names that match no probesim crate, kept for reporting once logging is up
    unknown: Vec<String>,
}

/// `probesim-atlas` -> `probesim_atlas`
fn target_name(crate_name: &str) -> String {
    crate_name.trim().replace('-', "_")
}

impl CrateDebugFlags {
    /// Collect `--debug-<crate>` and `--debug-all` from `args`; other arguments are ignored.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = Self::default();
        for arg in args {
            if let Some(name) = arg.strip_prefix("--debug-") {
                flags.enable(name);
            }
        }
        flags
    }

    /// Enable one crate by name, or every known crate for `all`.
    pub fn enable(&mut self, crate_name: &str) {
        if crate_name == "all" {
            self.targets.extend(KNOWN_CRATES.iter().map(|c| target_name(c)));
            return;
        }
        let target = target_name(crate_name);
        if target.is_empty() {
            return;
        }
        if KNOWN_CRATES.iter().any(|c| target_name(c) == target) {
            self.targets.insert(target);
        } else if !self.unknown.contains(&crate_name.to_string()) {
            self.unknown.push(crate_name.to_string());
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.targets.contains(&target_name(crate_name))
    }

    pub fn any_enabled(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Requested names that are not probesim crates.
    pub fn unknown_crates(&self) -> &[String] {
        &self.unknown
    }

    /// `EnvFilter` directives: `<target>=debug` per enabled crate, then `default_level`.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        self.targets
            .iter()
            .map(|target| format!("{}=debug", target))
            .chain(std::iter::once(default_level.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Flags from the process arguments plus `PROBESIM_DEBUG` (comma list, or `all`).
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var("PROBESIM_DEBUG") {
        for name in value.split(',') {
            flags.enable(name.trim());
        }
    }
    flags
}

pub fn debug_flags_help() -> String {
    format!(
        "Debug flags:\n  \
         --debug-all              debug output for every probesim crate\n  \
         --debug-<crate>          debug output for one crate: {}\n  \
         PROBESIM_DEBUG=a,b|all   same, from the environment\n",
        KNOWN_CRATES.join(", ")
    )
}
