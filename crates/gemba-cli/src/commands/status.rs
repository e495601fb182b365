//! `gemba status`: wait for one snapshot, print it, exit.

use std::sync::Arc;
use std::time::Duration;

use gemba_core::{ChannelState, Monitor, Snapshot, WsTransport};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::build_monitor_config(global)?;
    let monitor = Monitor::from_config(config)?;
    monitor.start();

    let outcome = tokio::time::timeout(
        Duration::from_secs(args.timeout),
        first_snapshot(&monitor),
    )
    .await;

    monitor.stop();

    match outcome {
        Ok(Ok(snapshot)) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&*snapshot)?);
            } else {
                print!("{}", output::summary(&snapshot));
            }
            Ok(())
        }
        Ok(Err(err)) => Err(err),
        Err(_) => Err(CliError::Timeout {
            seconds: args.timeout,
        }),
    }
}

async fn first_snapshot(monitor: &Monitor<WsTransport>) -> Result<Arc<Snapshot>, CliError> {
    let mut snapshots = monitor.snapshot();
    let mut states = monitor.state();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(CliError::ChannelFailed {
                        reason: "channel ended unexpectedly".into(),
                    });
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    return Ok(snapshot);
                }
            }

            changed = states.changed() => {
                let failed = changed.is_err()
                    || *states.borrow_and_update() == ChannelState::Failed;
                if failed {
                    let reason = monitor
                        .last_error()
                        .unwrap_or_else(|| "reconnection attempts exhausted".into());
                    return Err(CliError::ChannelFailed { reason });
                }
            }
        }
    }
}
