//! `taskswarm config`: Configuration commands.

use taskswarm_config::AppConfig;

/// Print a default config file.
pub async fn show_default() -> Result<(), Box<dyn std::error::Error>> {
    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    println!("{}", AppConfig::default_toml());
    Ok(())
}

/// Print the effective configuration, without the API key.
pub async fn show_current() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let has_key = config.has_api_key();
    config.api_key = None;

    println!("{}", toml::to_string_pretty(&config)?);
    println!("# API key: {}", if has_key { "set" } else { "not set" });
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
