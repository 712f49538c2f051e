//! `hassync states` -- print the grouped mirror once, then exit.

use hassync_core::{EngineConfig, SyncEngine};

use crate::cli::{GlobalOpts, StatesArgs};
use crate::commands::util;
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: StatesArgs,
    mut engine_config: EngineConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // One-shot: no refresh loop, no reconnect, no alert stream.
    engine_config.refresh_interval_secs = 0;
    engine_config.auto_reconnect = false;
    engine_config.notifications_enabled = false;

    let engine = SyncEngine::new(engine_config);
    engine.connect().await;
    util::wait_until_live(&engine, global.timeout).await?;

    let view = engine.store().snapshot();
    print!(
        "{}",
        output::render_states(&view, args.domain.as_deref(), output::should_color())
    );

    engine.disconnect().await;
    Ok(())
}
