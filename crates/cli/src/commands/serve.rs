//! `coursemate serve`: Start the HTTP API server.

use std::path::Path;

pub async fn run(config: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📚 Coursemate Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {}", config.assistant.provider);
    println!("   Store:     {}", config.retrieval.backend);

    coursemate_gateway::start(config).await?;

    Ok(())
}
