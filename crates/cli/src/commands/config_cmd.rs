//! `salin config` — Configuration commands.

use salin_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let has_key = config.has_api_key();
    config.api_key = config.api_key.as_ref().map(|_| "[redacted]".into());
    for provider in config.providers.values_mut() {
        provider.api_key = provider.api_key.as_ref().map(|_| "[redacted]".into());
    }

    println!("# {}", AppConfig::config_dir().join("config.toml").display());
    if !has_key {
        println!("# No API key set (GROQ_API_KEY, OPENAI_API_KEY or SALIN_API_KEY)");
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let config_path = dir.join("config.toml");

    if config_path.exists() {
        println!("  Config already exists at {}", config_path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("  ✅ Wrote default config to {}", config_path.display());
    println!("  Set GROQ_API_KEY or add api_key to the file before running `salin chat`.");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
