//! Command dispatch: bridges CLI args -> sync engine -> line output.

pub mod config_cmd;
pub mod states;
pub mod toggle;
pub mod util;
pub mod watch;

use hassync_core::EngineConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a connection-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    engine_config: EngineConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(args, engine_config).await,
        Command::States(args) => states::handle(args, engine_config, global).await,
        Command::Toggle(args) => toggle::handle(args, engine_config, global).await,
        // Config is handled before dispatch
        Command::Config(_) => unreachable!(),
    }
}
