pub mod chat;
pub mod config_cmd;
pub mod judge;

use salin_config::AppConfig;

/// Providers that run locally and need no API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp"];

/// Load the config and fail early, with setup instructions, when no key is set.
pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && !KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export GROQ_API_KEY='gsk_...'     (default provider)");
        eprintln!("    export OPENAI_API_KEY='sk-...'    (for OpenAI direct)");
        eprintln!("    export SALIN_API_KEY='...'        (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    Ok(config)
}
