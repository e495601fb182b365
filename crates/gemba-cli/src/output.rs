//! Human-readable rendering of dashboard snapshots.

use std::fmt::Write;

use chrono::Local;
use gemba_core::{AlarmLevel, Snapshot};
use owo_colors::OwoColorize;

/// Multi-line summary view used by `gemba watch` and `gemba status`.
pub fn summary(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    let stamp = snapshot
        .update_time
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S");
    let _ = writeln!(out, "{}", format!("── {stamp} ──").bold());

    let _ = writeln!(
        out,
        "devices     {} online / {} offline / {} alarming (of {})",
        snapshot.online_devices.green(),
        snapshot.offline_devices.yellow(),
        snapshot.alarm_devices.red(),
        snapshot.total_devices,
    );

    let _ = writeln!(
        out,
        "production  {} / {} planned ({:.2}%)",
        snapshot.today_production,
        snapshot.plan_production,
        snapshot.production_rate,
    );

    let _ = writeln!(
        out,
        "rates       efficiency {:.2}%  quality {:.2}%  running {:.2}%",
        snapshot.equipment_efficiency, snapshot.quality_rate, snapshot.running_rate,
    );

    let unresolved: Vec<_> = snapshot.unresolved_alarms().collect();
    if unresolved.is_empty() {
        let _ = writeln!(out, "alarms      {}", "none active".green());
    } else {
        let _ = writeln!(out, "alarms      {} active", unresolved.len().red());
        for alarm in unresolved.iter().take(5) {
            let level = match alarm.level {
                AlarmLevel::Normal => "normal".to_string(),
                AlarmLevel::Major => "major".yellow().to_string(),
                AlarmLevel::Critical => "critical".red().bold().to_string(),
            };
            let _ = writeln!(
                out,
                "  [{level}] {}: {}",
                alarm.device_name, alarm.alarm_content
            );
        }
        if unresolved.len() > 5 {
            let _ = writeln!(out, "  ... and {} more", unresolved.len() - 5);
        }
    }

    out
}
