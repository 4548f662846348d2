//! `coursemate doctor`: Diagnose configuration and connectivity.

use std::path::Path;

use coursemate_config::AppConfig;

pub async fn run(config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Coursemate Doctor — Diagnostics");
    println!("==================================\n");

    let mut issues = 0;

    let config_path = super::config_path(config);
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file — using defaults (run `coursemate init`)");
    }

    let config = match AppConfig::load_with_env(&config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config and run doctor again.");
            return Ok(());
        }
    };

    // Completion provider
    let provider = coursemate_providers::build_from_config(&config);
    if !provider.is_configured() {
        println!(
            "  ⚠️  No API key for '{}' — answers will be canned",
            config.assistant.provider
        );
        issues += 1;
    } else {
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ❌ Provider '{}' unhealthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        }
    }

    // Vector store
    let retrieval = coursemate_retrieval::build_from_config(&config);
    match retrieval.health_check().await {
        Ok(true) => println!(
            "  ✅ Store '{}' reachable ({})",
            retrieval.store_name(),
            retrieval.mode().label()
        ),
        Ok(false) => {
            println!("  ❌ Store '{}' unhealthy — answers will use mock data", retrieval.store_name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Store '{}' unreachable: {e} — answers will use mock data", retrieval.store_name());
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
