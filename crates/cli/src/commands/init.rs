//! `coursemate init`: Write a default config file.

use std::path::Path;

use coursemate_config::AppConfig;

pub fn run(config: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_path(config);

    println!("📚 Coursemate — Setup");
    println!("=====================\n");

    if let Some(dir) = config_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() && !force {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set ANTHROPIC_API_KEY (or add [providers.anthropic] api_key)");
    println!("   2. Optionally point [retrieval] at Supabase or Chroma");
    println!("   3. Run: coursemate ask\n");

    Ok(())
}
