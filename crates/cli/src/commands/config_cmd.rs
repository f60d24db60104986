//! `bolty config`: configuration management commands.

use bolty_providers::router::default_base_url;
use std::path::Path;

pub async fn validate(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match super::load_config(explicit) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() && !matches!(config.backend.as_str(), "ollama" | "vllm") {
                warnings.push("No API key set (set GEMINI_API_KEY or BOLTY_API_KEY)");
            }
            if config.preferred_models.is_empty() {
                warnings.push("No preferred models; only discovered models will be tried");
            }
            if config.retry.base_delay_ms == 0 {
                warnings.push("retry.base_delay_ms is 0; transient failures retry without backoff");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backend:     {}", config.backend);
            println!(
                "   Endpoint:    {}",
                config
                    .api_url
                    .clone()
                    .unwrap_or_else(|| default_base_url(&config.backend))
            );
            println!("   Models:      {}", config.preferred_models.join(", "));
            println!("   Project:     {}", config.project_type);
            println!(
                "   Retries:     {} per model, base delay {} ms",
                config.retry.max_retries, config.retry.base_delay_ms
            );
            println!("   Concurrency: {}", config.concurrency.max_in_flight);
            println!("   Workspace:   {}", config.workspace.base_dir);
            println!("   Store:       {}", config.store.backend);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(explicit).map_err(|e| format!("Failed to load config: {e}"))?;
    if config.api_key.is_some() {
        config.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", super::config_file(explicit).display());
    Ok(())
}
