use cadence_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config::CliConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, effective: &CliConfig) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { api_url, token } => {
            let mut config = CliConfig::load()?;
            if let Some(url) = normalize_text_option(api_url) {
                config.core.remote_base_url = Some(url);
            }
            if let Some(token) = normalize_text_option(token) {
                config.api_token = Some(token);
            }
            let path = config.save()?;
            println!("Saved config to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            println!("{}", render_config(effective)?);
            Ok(())
        }
    }
}

/// Pretty JSON with the API token redacted
pub fn render_config(config: &CliConfig) -> Result<String, CliError> {
    let mut shown = config.clone();
    if shown.api_token.is_some() {
        shown.api_token = Some("[REDACTED]".to_string());
    }
    Ok(serde_json::to_string_pretty(&shown)?)
}
