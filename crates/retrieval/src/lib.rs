//! Course content retrieval for Coursemate.
//!
//! - `VectorStore` adapters: Supabase (pgvector RPC), Chroma (REST), and a
//!   built-in in-memory course index
//! - `OpenAiEmbedder` for stores that are queried by embedding
//! - `RetrievalClient`, which applies proficiency thresholds, timeouts, and
//!   the fallback passages

pub mod chroma;
pub mod client;
pub mod embedder;
pub mod memory;
pub mod supabase;

use std::sync::Arc;
use std::time::Duration;

use coursemate_config::AppConfig;
use coursemate_core::retrieval::{Embedder, VectorStore};
use tracing::{info, warn};

pub use chroma::ChromaStore;
pub use client::{MAX_SEARCH_RESULTS, RetrievalClient, RetrievalOutcome, StoreMode, fallback_passages};
pub use embedder::OpenAiEmbedder;
pub use memory::{InMemoryStore, IndexedPassage};
pub use supabase::SupabaseStore;

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn embedder_from_config(config: &AppConfig) -> Option<Arc<dyn Embedder>> {
    let api_key = config.provider_api_key("openai")?;
    let mut embedder = OpenAiEmbedder::new(api_key, &config.retrieval.embedding_model);
    if let Some(url) = config.provider_api_url("openai") {
        embedder = embedder.with_base_url(url);
    }
    Some(Arc::new(embedder))
}

fn builtin_store() -> (Arc<dyn VectorStore>, StoreMode) {
    (Arc::new(InMemoryStore::course_index()), StoreMode::Fallback)
}

/// Build the retrieval client from configuration without touching the network.
///
/// A Supabase backend needs query embeddings; without an OpenAI key it
/// cannot be queried and the built-in index is used instead.
pub fn build_from_config(config: &AppConfig) -> RetrievalClient {
    let retrieval = &config.retrieval;

    let (store, mode): (Arc<dyn VectorStore>, StoreMode) =
        match (retrieval.backend.as_str(), retrieval.url.as_deref()) {
            ("supabase", Some(url)) => match embedder_from_config(config) {
                Some(embedder) => (
                    Arc::new(SupabaseStore::new(
                        url,
                        retrieval.api_key.clone().unwrap_or_default(),
                        &retrieval.collection,
                        embedder,
                    )),
                    StoreMode::Primary,
                ),
                None => {
                    warn!("Supabase backend needs an OpenAI key for query embeddings, using the built-in index");
                    builtin_store()
                }
            },
            ("chroma", Some(url)) => {
                let mut store = ChromaStore::new(url, &retrieval.collection);
                if let Some(embedder) = embedder_from_config(config) {
                    store = store.with_embedder(embedder);
                }
                (Arc::new(store), StoreMode::Primary)
            }
            _ => builtin_store(),
        };

    RetrievalClient::new(store, mode)
        .with_top_k(retrieval.top_k)
        .with_timeout(Duration::from_secs(retrieval.timeout_secs))
}

/// Build the client and check the store is reachable. An unreachable store
/// is replaced by the built-in index so the service still starts.
pub async fn connect(config: &AppConfig) -> RetrievalClient {
    let client = build_from_config(config);
    if client.mode() == StoreMode::Fallback {
        info!("Using the built-in course index");
        return client;
    }

    match client.health_check().await {
        Ok(true) => {
            info!(store = client.store_name(), "Connected to vector store");
            client
        }
        Ok(false) | Err(_) => {
            warn!(
                store = client.store_name(),
                "Vector store unreachable, falling back to the built-in course index"
            );
            let (store, mode) = builtin_store();
            RetrievalClient::new(store, mode)
                .with_top_k(config.retrieval.top_k)
                .with_timeout(Duration::from_secs(config.retrieval.timeout_secs))
        }
    }
}
