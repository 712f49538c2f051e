//! Helpers shared by connection-bound commands.

use std::time::Duration;

use hassync_core::{ConnectionState, SyncEngine, SyncStatus};

use crate::error::CliError;

/// Block until the mirror is `Live`, or fail on a terminal status or
/// the timeout.
pub async fn wait_until_live(engine: &SyncEngine, timeout_secs: u64) -> Result<(), CliError> {
    let mut states = engine.connection_state();
    let mut status = engine.status();

    let wait = async {
        loop {
            match states.borrow_and_update().clone() {
                ConnectionState::Live => return Ok(()),
                ConnectionState::Disconnected => {
                    let current = status.borrow_and_update().clone();
                    if current.is_error {
                        return Err(terminal_error(&current));
                    }
                }
                _ => {}
            }

            if states.changed().await.is_err() {
                return Err(CliError::ConnectionFailed {
                    detail: "engine stopped".into(),
                });
            }
        }
    };

    match tokio::time::timeout(Duration::from_secs(timeout_secs), wait).await {
        Ok(result) => result,
        Err(_) => Err(CliError::Timeout {
            seconds: timeout_secs,
        }),
    }
}

/// Map a terminal error status to the matching CLI error.
pub fn terminal_error(status: &SyncStatus) -> CliError {
    if status.message.contains("Authentication failed") {
        CliError::AuthFailed {
            detail: status.message.clone(),
        }
    } else {
        CliError::ConnectionFailed {
            detail: status.message.clone(),
        }
    }
}
