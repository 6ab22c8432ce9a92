//! Advisory per-turn telemetry: a wall-clock energy estimate and a process/
//! system RAM sample. Neither ever blocks or fails the request path — per
//! §5, this feeds `TurnEvent` only and is never consulted for admission.

use std::time::Instant;

use sysinfo::System;

use crate::RamPeak;

/// Accumulates elapsed time from `start` and converts it to watt-hours at a
/// fixed idle-power estimate: `energy_wh = (idle_watts * elapsed_seconds) /
/// 3600`.
pub struct EnergyMeter {
    started_at: Instant,
    idle_watts: f64,
}

impl EnergyMeter {
    pub fn start(idle_watts: f64) -> Self {
        Self { started_at: Instant::now(), idle_watts }
    }

    pub fn stop(self) -> f64 {
        let elapsed_secs = self.started_at.elapsed().as_secs_f64();
        let wh = (self.idle_watts * elapsed_secs) / 3600.0;
        round_to(wh, 4)
    }
}

/// Samples process RSS and system-used memory, both in MB. Falls back to a
/// zeroed reading if the platform doesn't expose the metric rather than
/// erroring the turn.
pub fn sample_ram_peak() -> RamPeak {
    let mut system = System::new();
    system.refresh_memory();
    let sys_mb = bytes_to_mb(system.used_memory());

    let proc_mb = sysinfo::get_current_pid()
        .ok()
        .map(|pid| {
            system.refresh_process(pid);
            system.process(pid).map(|process| bytes_to_mb(process.memory())).unwrap_or(0.0)
        })
        .unwrap_or(0.0);

    RamPeak { proc_mb: round_to(proc_mb, 1), sys_mb: round_to(sys_mb, 1) }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
