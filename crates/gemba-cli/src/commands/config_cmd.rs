//! `gemba config`: inspect and bootstrap the config file.

use gemba_config::ConfigError;

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

pub fn handle(args: ConfigArgs) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", gemba_config::config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = gemba_config::load_config()?;
            let toml_str = toml::to_string_pretty(&cfg).map_err(ConfigError::from)?;
            print!("{toml_str}");
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = gemba_config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            gemba_config::save_config(&gemba_config::starter_config())?;
            eprintln!("Wrote starter config to {}", path.display());
            Ok(())
        }
    }
}
