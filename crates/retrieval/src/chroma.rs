//! Chroma store over its REST API.
//!
//! Chroma reports distances, not similarities. How a distance maps to a
//! relevance in [0, 1] depends on the collection's `hnsw:space`, which is
//! read together with the collection id when the configured name is first
//! resolved. Collections created without one use squared L2.

use std::sync::Arc;

use async_trait::async_trait;
use coursemate_core::error::RetrievalError;
use coursemate_core::retrieval::{Embedder, PassageMetadata, QueryResult, VectorStore};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub struct ChromaStore {
    url: String,
    collection: String,
    resolved: OnceCell<ResolvedCollection>,
    /// Without an embedder the query text is sent as-is and Chroma embeds it
    /// with the collection's own function.
    embedder: Option<Arc<dyn Embedder>>,
    client: reqwest::Client,
}

impl ChromaStore {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            resolved: OnceCell::new(),
            embedder: None,
            client: crate::http_client(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    async fn collection(&self) -> Result<&ResolvedCollection, RetrievalError> {
        self.resolved
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections/{}", self.url, self.collection);
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

                let status = response.status().as_u16();
                if status != 200 {
                    let message = response.text().await.unwrap_or_default();
                    return Err(RetrievalError::QueryFailed {
                        status_code: status,
                        message,
                    });
                }

                let info: CollectionInfo = response
                    .json()
                    .await
                    .map_err(|e| RetrievalError::Malformed(format!("collection lookup: {e}")))?;
                let space = DistanceSpace::from_metadata(info.metadata.as_ref());
                info!(
                    collection = %self.collection,
                    id = %info.id,
                    space = ?space,
                    "Resolved Chroma collection"
                );
                Ok(ResolvedCollection { id: info.id, space })
            })
            .await
    }

    async fn query_body(&self, query_text: &str, top_k: usize) -> Result<serde_json::Value, RetrievalError> {
        let include = ["documents", "metadatas", "distances"];
        Ok(match &self.embedder {
            Some(embedder) => serde_json::json!({
                "query_embeddings": [embedder.embed(query_text).await?],
                "n_results": top_k,
                "include": include,
            }),
            None => serde_json::json!({
                "query_texts": [query_text],
                "n_results": top_k,
                "include": include,
            }),
        })
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn query(&self, query_text: &str, top_k: usize) -> Result<QueryResult, RetrievalError> {
        let collection = self.collection().await?;
        let url = format!("{}/api/v1/collections/{}/query", self.url, collection.id);
        let body = self.query_body(query_text, top_k).await?;

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrievalError::QueryFailed {
                status_code: status,
                message,
            });
        }

        let parsed: ChromaQueryResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Malformed(format!("unexpected query response: {e}")))?;

        let result = parsed.into_result(collection.space);
        debug!(documents = result.documents.len(), "Chroma returned matches");
        Ok(result)
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        let response = self
            .client
            .get(format!("{}/api/v1/heartbeat", self.url))
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug)]
struct ResolvedCollection {
    id: String,
    space: DistanceSpace,
}

/// The distance function a collection was indexed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DistanceSpace {
    /// Squared euclidean; Chroma's default
    #[default]
    L2,
    Cosine,
    /// Inner product, reported as `1 - dot`
    Ip,
}

impl DistanceSpace {
    fn from_metadata(metadata: Option<&serde_json::Map<String, serde_json::Value>>) -> Self {
        match metadata
            .and_then(|m| m.get("hnsw:space"))
            .and_then(|v| v.as_str())
        {
            Some("cosine") => Self::Cosine,
            Some("ip") => Self::Ip,
            _ => Self::L2,
        }
    }

    /// Relevance in [0, 1]. For unit-norm embeddings a squared L2 distance
    /// is `2 * (1 - cos)`, so all three spaces map back to cosine similarity.
    /// Non-finite distances pass through for the caller to reject.
    fn relevance(self, distance: f64) -> f64 {
        if !distance.is_finite() {
            return distance;
        }
        let similarity = match self {
            Self::L2 => 1.0 - distance / 2.0,
            Self::Cosine | Self::Ip => 1.0 - distance,
        };
        similarity.clamp(0.0, 1.0)
    }
}

/// Chroma nests every field one level per query text; we send exactly one.
#[derive(Debug, Default, Deserialize)]
struct ChromaQueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<PassageMetadata>>>,
    #[serde(default)]
    distances: Vec<Vec<f64>>,
}

impl ChromaQueryResponse {
    fn into_result(self, space: DistanceSpace) -> QueryResult {
        let documents = self
            .documents
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let metadatas = self
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let scores = self
            .distances
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|d| space.relevance(d))
            .collect();

        QueryResult {
            documents,
            metadatas,
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distances_become_clamped_relevance() {
        let space = DistanceSpace::Cosine;
        assert!((space.relevance(0.2) - 0.8).abs() < 1e-9);
        assert_eq!(space.relevance(1.7), 0.0);
        assert_eq!(space.relevance(-0.1), 1.0);
        assert!(space.relevance(f64::NAN).is_nan());
    }

    #[test]
    fn default_l2_space_maps_back_to_cosine() {
        // Unit vectors at cosine 0.7 sit at squared L2 distance 0.6
        let relevance = DistanceSpace::L2.relevance(0.6);
        assert!((relevance - 0.7).abs() < 1e-9);
        assert!(relevance >= 0.5, "a strong match must clear the intermediate threshold");
        assert_eq!(DistanceSpace::L2.relevance(4.0), 0.0);
        assert_eq!(DistanceSpace::L2.relevance(0.0), 1.0);
    }

    #[test]
    fn space_read_from_collection_metadata() {
        let info: CollectionInfo = serde_json::from_str(
            r#"{"id": "c1", "name": "course_content", "metadata": {"hnsw:space": "cosine"}}"#,
        )
        .unwrap();
        assert_eq!(DistanceSpace::from_metadata(info.metadata.as_ref()), DistanceSpace::Cosine);

        let info: CollectionInfo =
            serde_json::from_str(r#"{"id": "c2", "name": "course_content", "metadata": null}"#).unwrap();
        assert_eq!(DistanceSpace::from_metadata(info.metadata.as_ref()), DistanceSpace::L2);

        let info: CollectionInfo =
            serde_json::from_str(r#"{"id": "c3", "metadata": {"hnsw:space": "ip"}}"#).unwrap();
        assert_eq!(DistanceSpace::from_metadata(info.metadata.as_ref()), DistanceSpace::Ip);
    }

    #[test]
    fn nested_response_flattens() {
        let parsed: ChromaQueryResponse = serde_json::from_str(
            r#"{
                "ids": [["a", "b"]],
                "documents": [["LLMs predict tokens.", null]],
                "metadatas": [[{"source": "AI Foundations", "location": "module1/llms.html"}, null]],
                "distances": [[0.25, 0.9]]
            }"#,
        )
        .unwrap();

        let passages = parsed.into_result(DistanceSpace::Cosine).into_passages().unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].source_label, "AI Foundations");
        assert!((passages[0].relevance_score - 0.75).abs() < 1e-6);
        assert_eq!(passages[1].location, "Unknown");
    }

    #[test]
    fn mismatched_arrays_surface_as_malformed() {
        let parsed: ChromaQueryResponse = serde_json::from_str(
            r#"{"documents": [["x", "y"]], "metadatas": [[]], "distances": [[0.1]]}"#,
        )
        .unwrap();
        assert!(matches!(
            parsed.into_result(DistanceSpace::L2).into_passages(),
            Err(RetrievalError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn text_query_body_without_embedder() {
        let store = ChromaStore::new("http://localhost:8000/", "course_content");
        let body = store.query_body("what is attention", 4).await.unwrap();
        assert_eq!(body["query_texts"][0], "what is attention");
        assert_eq!(body["n_results"], 4);
        assert_eq!(store.url, "http://localhost:8000");
    }
}
