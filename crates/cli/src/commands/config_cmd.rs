//! `rollcall config`: Configuration management commands.

use rollcall_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_api_key() && config.default_provider != "ollama" {
                warnings.push(
                    "No API key set (set ROLLCALL_API_KEY or OPENROUTER_API_KEY env var)".to_string(),
                );
            }

            if config.default_temperature > 0.0 {
                warnings.push(format!(
                    "default_temperature is {}; matching is only reproducible at 0.0",
                    config.default_temperature
                ));
            }

            if !config.matching.strict_response {
                warnings.push("matching.strict_response is off; unknown reply fields are ignored".into());
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
            println!("   Provider:   {}", config.default_provider);
            println!("   Model:      {}", config.model_for(&config.default_provider));
            println!(
                "   Roster:     cells > {} chars, >= {} words",
                config.extraction.min_roster_cell_chars, config.extraction.min_roster_tokens
            );
            println!("   On failure: {:?}", config.extraction.image_failure_policy);
            println!("   Timeout:    {}s", config.matching.request_timeout_secs);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    redact(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redact(config: &mut AppConfig) {
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("***".into());
        }
    };
    mask(&mut config.api_key);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_config::ProviderConfig;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_redacts_keys() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other".into()),
                api_url: None,
                default_model: None,
            },
        );
        redact(&mut config);

        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("sk-other"));
        assert!(rendered.contains("***"));
    }
}
