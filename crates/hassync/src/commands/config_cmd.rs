//! `hassync config` -- create and inspect the TOML configuration.

use crate::cli::{ConfigAction, ConfigArgs, GlobalOpts};
use crate::config::{self, Profile};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, _global: &GlobalOpts) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigAction::Show => {
            let mut cfg = config::load_config()?;
            for profile in cfg.profiles.values_mut() {
                if profile.token.is_some() {
                    profile.token = Some("<redacted>".into());
                }
            }
            print!("{}", toml::to_string_pretty(&cfg)?);
            Ok(())
        }

        ConfigAction::Init => {
            let path = config::config_path();
            if path.exists() {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut cfg = config::Config::default();
            cfg.profiles.insert(
                "default".into(),
                Profile {
                    url: "ws://homeassistant.local:8123/api/websocket".into(),
                    token_env: Some("HASSYNC_TOKEN".into()),
                    ..Profile::default()
                },
            );
            config::save_config(&cfg)?;

            println!("wrote {}", path.display());
            Ok(())
        }
    }
}
