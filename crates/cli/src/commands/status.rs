//! `rollcall status`: Show the effective settings.

use rollcall_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let export = &config.export;

    println!("📋 Rollcall Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Reports:      {}", AppConfig::reports_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.model_for(&config.default_provider));
    println!("  Temperature:  {}", config.default_temperature);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Strict reply: {}", if config.matching.strict_response { "yes" } else { "no" });
    println!(
        "  Export:       '{}' delimited, labels {}/{}/{}",
        export.delimiter,
        export.status_labels.present,
        export.status_labels.absent,
        export.status_labels.unexpected
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `rollcall onboard` first");
    }

    Ok(())
}
