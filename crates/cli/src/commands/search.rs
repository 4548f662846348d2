//! `coursemate search`: Raw semantic search over course content.

use std::path::Path;

pub async fn run(
    config: Option<&Path>,
    query: &str,
    num_results: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config)?;
    let client = coursemate_retrieval::connect(&config).await;

    let query = query.trim();
    if query.is_empty() {
        return Err(coursemate_core::error::InputError::MissingQuery.into());
    }

    let passages = client.search(query, num_results).await?;

    println!("🔎 {} result(s) for \"{query}\" ({})\n", passages.len(), client.mode().label());
    for (i, passage) in passages.iter().enumerate() {
        println!(
            "  [{}] {:.2}  {} ({})",
            i + 1,
            passage.relevance_score,
            passage.source_label,
            passage.location
        );
        println!("      {}\n", passage.content);
    }

    Ok(())
}
