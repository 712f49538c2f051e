//! `hassync toggle` -- send one service call against an entity.

use std::time::Duration;

use hassync_core::{EngineConfig, EntityId, SyncEngine};

use crate::cli::{GlobalOpts, ToggleArgs};
use crate::commands::util;
use crate::error::CliError;

pub async fn handle(
    args: ToggleArgs,
    mut engine_config: EngineConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    engine_config.refresh_interval_secs = 0;
    engine_config.auto_reconnect = false;
    engine_config.notifications_enabled = false;

    let engine = SyncEngine::new(engine_config);
    engine.connect().await;
    util::wait_until_live(&engine, global.timeout).await?;

    let entity_id = EntityId::new(args.entity_id.clone());
    if engine.store().get(&entity_id).is_none() {
        engine.disconnect().await;
        return Err(CliError::EntityNotFound {
            entity_id: args.entity_id,
        });
    }

    engine
        .call_service(entity_id.clone(), args.service.clone())
        .await
        .map_err(|_| CliError::ConnectionFailed {
            detail: "engine stopped".into(),
        })?;

    // Fire-and-forget: give the session a beat to flush the frame
    // before tearing the connection down.
    tokio::time::sleep(Duration::from_millis(250)).await;
    engine.disconnect().await;

    println!("sent {}.{} to {entity_id}", entity_id.domain(), args.service);
    Ok(())
}
