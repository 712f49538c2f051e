//! `hassync watch` -- stream the mirror until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;

use hassync_core::{ConnectionState, EngineConfig, SyncEngine};

use crate::cli::WatchArgs;
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, engine_config: EngineConfig) -> Result<(), CliError> {
    let color = output::should_color();

    let engine = SyncEngine::new(engine_config);
    engine.connect().await;

    let mut status = engine.status();
    let mut entities = engine.entities();
    let mut alerts = engine.alerts();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                engine.disconnect().await;
                println!("{}", output::status_line(&engine.status().borrow().clone(), color));
                return Ok(());
            }

            changed = status.changed() => {
                if changed.is_err() {
                    return Err(CliError::ConnectionFailed {
                        detail: "engine stopped".into(),
                    });
                }
                let current = status.borrow_and_update().clone();
                println!("{}", output::status_line(&current, color));

                // Terminal failure: auth rejection, retry cap, or a close
                // with auto-reconnect off.
                if current.is_error && engine.current_state() == ConnectionState::Disconnected {
                    return Err(util::terminal_error(&current));
                }
            }

            changed = entities.changed() => {
                if changed.is_ok() {
                    let view = entities.borrow_and_update().clone();
                    println!("{}", output::domain_summary(&view));
                }
            }

            alert = alerts.recv() => {
                match alert {
                    Ok(alert) if !args.no_alerts => println!("{}: {}", alert.title, alert.body),
                    Ok(_) => {}
                    // Slow terminal: skip missed alerts, keep streaming.
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "alert stream lagged");
                    }
                    // Status branch reports engine shutdown.
                    Err(RecvError::Closed) => {}
                }
            }
        }
    }
}
