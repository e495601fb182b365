//! `gemba watch`: stream snapshots until interrupted or the channel fails.

use gemba_core::{ChannelState, Monitor};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::build_monitor_config(global)?;
    let monitor = Monitor::from_config(config)?;
    monitor.start();

    let mut snapshots = monitor.snapshot();
    let mut states = monitor.state();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                monitor.stop();
                return Ok(());
            }

            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                match *states.borrow_and_update() {
                    ChannelState::Failed => {
                        let reason = monitor
                            .last_error()
                            .unwrap_or_else(|| "reconnection attempts exhausted".into());
                        return Err(CliError::ChannelFailed { reason });
                    }
                    ChannelState::Reconnecting { attempt } => {
                        tracing::info!(attempt, "connection lost, reconnecting");
                    }
                    _ => {}
                }
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    if args.json {
                        println!("{}", serde_json::to_string(&*snapshot)?);
                    } else {
                        println!("{}", output::summary(&snapshot));
                    }
                }
            }
        }
    }
}
