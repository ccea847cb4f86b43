//! `rollcall onboard`: First-time setup.

use rollcall_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let reports_dir = AppConfig::reports_dir();

    println!("📋 Rollcall — First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !reports_dir.exists() {
        std::fs::create_dir_all(&reports_dir)?;
        println!("✅ Created reports directory: {}", reports_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Run: rollcall analyze --roster class.xlsx --capture shot1.png --review\n");
    }

    println!("🎉 Setup complete!\n");

    Ok(())
}
