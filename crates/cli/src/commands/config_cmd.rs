//! `tinyreact config` — Print the effective configuration.

use tinyreact_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", render(&config)?);
    Ok(())
}

/// TOML for `config` with the API key masked.
fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("***".into());
    }
    toml::to_string_pretty(&shown)
}
