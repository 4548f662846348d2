//! Supabase (pgvector) store, queried through a PostgREST RPC function.
//!
//! The function takes `{query_embedding, match_threshold, match_count}` and
//! returns rows of `{content, title, url, section_title, similarity}`.

use std::sync::Arc;

use async_trait::async_trait;
use coursemate_core::error::RetrievalError;
use coursemate_core::retrieval::{Embedder, PassageMetadata, QueryResult, VectorStore};
use serde::Deserialize;
use tracing::{debug, warn};

/// Relevance filtering happens in the retrieval client, so the store is asked
/// for everything it has above zero.
const STORE_MATCH_THRESHOLD: f64 = 0.0;

pub struct SupabaseStore {
    url: String,
    api_key: String,
    function: String,
    embedder: Arc<dyn Embedder>,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        function: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            function: function.into(),
            embedder,
            client: crate::http_client(),
        }
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.url, self.function)
    }
}

#[async_trait]
impl VectorStore for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn query(&self, query_text: &str, top_k: usize) -> Result<QueryResult, RetrievalError> {
        let embedding = self.embedder.embed(query_text).await?;

        let body = serde_json::json!({
            "query_embedding": embedding,
            "match_threshold": STORE_MATCH_THRESHOLD,
            "match_count": top_k,
        });

        let response = self
            .client
            .post(self.rpc_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Supabase RPC failed");
            return Err(RetrievalError::QueryFailed {
                status_code: status,
                message,
            });
        }

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| RetrievalError::Malformed(format!("unexpected RPC rows: {e}")))?;

        debug!(rows = rows.len(), "Supabase returned matches");
        Ok(rows_to_result(rows))
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        let response = self
            .client
            .get(format!("{}/rest/v1/", self.url))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    content: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    section_title: Option<String>,
    similarity: f64,
}

fn rows_to_result(rows: Vec<MatchRow>) -> QueryResult {
    let mut result = QueryResult::default();
    for row in rows {
        result.documents.push(row.content);
        result.metadatas.push(PassageMetadata {
            source: row.title,
            location: row.url,
            section_title: row.section_title,
        });
        result.scores.push(row.similarity);
    }
    result
}
