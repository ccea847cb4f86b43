//! `rollcall doctor`: Diagnose setup problems.

use rollcall_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Rollcall Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                Some(config)
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  ⚠️  No config file — using defaults (run `rollcall onboard`)");
        AppConfig::load().ok()
    };

    if let Some(config) = &config {
        if config.has_api_key() || config.default_provider == "ollama" {
            println!("  ✅ API key configured");
        } else {
            println!("  ⚠️  No API key configured — set ROLLCALL_API_KEY or add api_key to config.toml");
            issues += 1;
        }

        let router = rollcall_providers::build_from_config(config);
        match router.default_provider() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider '{}' reachable", router.default_name()),
                Ok(false) => {
                    println!("  ⚠️  Provider '{}' answered but reports unhealthy", router.default_name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", router.default_name());
                    issues += 1;
                }
            },
            None => {
                println!("  ❌ No default provider could be built");
                issues += 1;
            }
        }
    }

    let reports_dir = AppConfig::reports_dir();
    if reports_dir.exists() {
        println!("  ✅ Reports directory exists");
    } else {
        println!("  ⚠️  No reports directory — run `rollcall onboard`");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
