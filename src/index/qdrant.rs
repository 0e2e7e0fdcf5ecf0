use super::{check_k, check_space, IndexEntry, RetrievalResult, ScoredChunk, VectorIndex};
use crate::chunking::Chunk;
use crate::config::IndexConfig;
use crate::embeddings::{Embedding, EmbeddingSpace};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use log::{debug, info};
use qdrant_client::qdrant::{
    vectors, vectors_config, with_payload_selector, CreateCollectionBuilder, Distance,
    NamedVectors, PointStruct, SearchPoints, UpsertPointsBuilder, VectorParams, VectorParamsMap,
    Vectors, VectorsConfig, WithPayloadSelector,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use std::collections::HashMap;

/// Vector index backed by a Qdrant server.
///
/// Each collection holds a single named vector whose name is the id of the
/// embedding space that populated it, so the space tag lives in the
/// collection schema itself.
pub struct QdrantIndex {
    client: Qdrant,
    database_name: String,
}

impl QdrantIndex {
    /// Create a new Qdrant client
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let url = config.url()?;

        let config_builder = Qdrant::from_url(url);
        let config_builder = if let Some(api_key) = &config.api_key {
            config_builder.api_key(api_key.clone())
        } else {
            config_builder
        };

        let client = config_builder.build().map_err(|e| {
            RagError::Configuration(format!("invalid Qdrant settings for {}: {}", url, e))
        })?;

        Ok(QdrantIndex {
            client,
            database_name: config.database_name.clone(),
        })
    }

    /// Physical Qdrant collection backing a logical collection
    pub fn physical_name(&self, collection: &str) -> String {
        get_collection_name(&self.database_name, collection)
    }

    async fn create_collection(&self, name: &str, space: &EmbeddingSpace) -> Result<()> {
        let mut map = HashMap::new();
        map.insert(
            space.id().to_string(),
            VectorParams {
                size: space.dimension() as u64,
                distance: Distance::Cosine.into(),
                ..Default::default()
            },
        );
        let vectors_config = VectorsConfig {
            config: Some(vectors_config::Config::ParamsMap(VectorParamsMap { map })),
        };

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await
            .map_err(|e| unavailable(name, e))?;

        info!(
            "Created collection {} for embedding space {} ({} dims)",
            name,
            space.id(),
            space.dimension()
        );
        Ok(())
    }

    /// Read the space tag from a physical collection's vector schema
    async fn physical_space(&self, name: &str) -> Result<Option<EmbeddingSpace>> {
        let response = match self.client.collection_info(name).await {
            Ok(response) => response,
            Err(QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                return Ok(None)
            }
            Err(e) => return Err(unavailable(name, e)),
        };

        let config = response
            .result
            .and_then(|info| info.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config);

        space_from_schema(name, config).map(Some)
    }
}

/// The space tag of a collection: its one and only named vector
fn space_from_schema(
    name: &str,
    config: Option<vectors_config::Config>,
) -> Result<EmbeddingSpace> {
    match config {
        Some(vectors_config::Config::ParamsMap(params)) if params.map.len() == 1 => {
            let (id, params) = params
                .map
                .into_iter()
                .next()
                .ok_or_else(|| unexpected_schema(name, "empty named vector map"))?;
            Ok(EmbeddingSpace::from_id(&id, params.size as usize))
        }
        _ => Err(unexpected_schema(
            name,
            "expected exactly one named vector tagging the embedding space",
        )),
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(
        &self,
        collection: &str,
        space: &EmbeddingSpace,
        entries: Vec<IndexEntry>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in &entries {
            space.check(&entry.vector)?;
        }

        let collection_name = self.physical_name(collection);
        match self.physical_space(&collection_name).await? {
            Some(existing) => check_space(collection, &existing, space)?,
            None => self.create_collection(&collection_name, space).await?,
        }

        let count = entries.len();
        let points = entries
            .into_iter()
            .map(|entry| to_point(collection, space, entry))
            .collect::<Result<Vec<PointStruct>>>()?;

        // Wait for the write so the points are visible to the next search
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection_name.clone(), points).wait(true))
            .await
            .map_err(|e| unavailable(&collection_name, e))?;

        debug!("Upserted {} points into {}", count, collection_name);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &Embedding,
        k: usize,
    ) -> Result<RetrievalResult> {
        check_k(k)?;

        let collection_name = self.physical_name(collection);
        let Some(space) = self.physical_space(&collection_name).await? else {
            return Ok(RetrievalResult::empty());
        };
        space.check(query)?;

        let search_request = SearchPoints {
            collection_name: collection_name.clone(),
            vector: query.values.clone(),
            vector_name: Some(space.id().to_string()),
            limit: k as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .map_err(|e| unavailable(&collection_name, e))?;

        let hits = search_response
            .result
            .into_iter()
            .map(|scored_point| {
                let payload = scored_point.payload;
                let text = payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| unexpected_schema(&collection_name, "point without text"))?
                    .to_string();
                let source_offset = payload
                    .get("source_offset")
                    .and_then(|v| v.as_integer())
                    .map(|v| v as usize)
                    .unwrap_or(0);
                let length = payload
                    .get("length")
                    .and_then(|v| v.as_integer())
                    .map(|v| v as usize)
                    .unwrap_or_else(|| text.chars().count());

                Ok(ScoredChunk {
                    chunk: Chunk {
                        text,
                        source_offset,
                        length,
                    },
                    score: scored_point.score,
                })
            })
            .collect::<Result<Vec<ScoredChunk>>>()?;

        Ok(RetrievalResult::new(hits))
    }

    async fn collection_space(&self, collection: &str) -> Result<Option<EmbeddingSpace>> {
        self.physical_space(&self.physical_name(collection)).await
    }
}

fn to_point(
    collection: &str,
    space: &EmbeddingSpace,
    entry: IndexEntry,
) -> Result<PointStruct> {
    let payload = Payload::try_from(json!({
        "text": entry.chunk.text,
        "source_offset": entry.chunk.source_offset,
        "length": entry.chunk.length,
        "collection": collection,
    }))
    .map_err(|e| RagError::IndexUnavailable {
        collection: collection.to_string(),
        message: format!("failed to build payload: {}", e),
    })?;

    let mut named = HashMap::new();
    named.insert(space.id().to_string(), entry.vector.values.into());
    let vectors = Vectors {
        vectors_options: Some(vectors::VectorsOptions::Vectors(NamedVectors {
            vectors: named,
        })),
    };

    Ok(PointStruct::new(entry.id, vectors, payload))
}

fn unavailable(collection: &str, error: QdrantError) -> RagError {
    RagError::IndexUnavailable {
        collection: collection.to_string(),
        message: error.to_string(),
    }
}

/// The collection exists but was not created by this index
fn unexpected_schema(collection: &str, detail: &str) -> RagError {
    RagError::Configuration(format!(
        "collection {} has an incompatible schema: {}",
        collection, detail
    ))
}

/// Generate a physical collection name from a database and collection name.
///
/// Both parts are escaped and joined with `-`, which never survives escaping,
/// so distinct pairs always map to distinct collections.
fn get_collection_name(database: &str, collection: &str) -> String {
    format!("{}-{}", escape_name(database), escape_name(collection))
}

/// Keep ASCII letters and digits; every other character becomes `_` and its
/// code point as six hex digits
fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            escaped.push(c);
        } else {
            escaped.push_str(&format!("_{:06x}", c as u32));
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name_is_prefixed_and_escaped() {
        assert_eq!(get_collection_name("default", "docs"), "default-docs");
        assert_eq!(
            get_collection_name("default", "Annual Report.pdf"),
            "default-Annual_000020Report_00002epdf"
        );
        assert_eq!(get_collection_name("Legal-DB", "docs"), "Legal_00002dDB-docs");
    }

    #[test]
    fn test_distinct_collections_never_share_a_name() {
        assert_ne!(
            get_collection_name("default", "Report.pdf"),
            get_collection_name("default", "report_pdf")
        );
        assert_ne!(
            get_collection_name("a_b", "c"),
            get_collection_name("a", "b_c")
        );
        assert_ne!(
            get_collection_name("a-b", "c"),
            get_collection_name("a", "b-c")
        );
        assert_ne!(
            get_collection_name("default", "docs"),
            get_collection_name("default", "Docs")
        );
    }

    #[test]
    fn test_single_named_vector_is_the_space_tag() {
        let mut map = HashMap::new();
        map.insert(
            "gemini-models_text-embedding-004".to_string(),
            VectorParams {
                size: 768,
                distance: Distance::Cosine.into(),
                ..Default::default()
            },
        );
        let config = vectors_config::Config::ParamsMap(VectorParamsMap { map });

        let space = space_from_schema("default-docs", Some(config)).unwrap();
        assert_eq!(space.id(), "gemini-models_text-embedding-004");
        assert_eq!(space.dimension(), 768);
    }

    #[test]
    fn test_unnamed_vector_schema_is_a_configuration_error() {
        let config = vectors_config::Config::Params(VectorParams {
            size: 768,
            distance: Distance::Cosine.into(),
            ..Default::default()
        });

        let err = space_from_schema("default-docs", Some(config)).unwrap_err();
        assert!(matches!(err, RagError::Configuration(msg) if msg.contains("default-docs")));
        assert!(matches!(
            space_from_schema("default-docs", None),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_url_is_configuration_error() {
        let config = IndexConfig {
            url: None,
            api_key: None,
            database_name: "default".to_string(),
            collection_name: "documents".to_string(),
        };
        assert!(matches!(
            QdrantIndex::new(&config),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_point_carries_named_vector_and_payload() {
        let space = EmbeddingSpace::new("test", "unit", 2);
        let chunk = Chunk {
            text: "Alpha".to_string(),
            source_offset: 800,
            length: 5,
        };
        let entry = IndexEntry::new(chunk, Embedding::new(vec![0.5, 0.5]));
        let point = to_point("docs", &space, entry).unwrap();

        let text = point.payload.get("text").and_then(|v| v.as_str());
        assert_eq!(text.map(String::as_str), Some("Alpha"));
        let offset = point.payload.get("source_offset").and_then(|v| v.as_integer());
        assert_eq!(offset, Some(800));
        let collection = point.payload.get("collection").and_then(|v| v.as_str());
        assert_eq!(collection.map(String::as_str), Some("docs"));
        match point.vectors.and_then(|v| v.vectors_options) {
            Some(vectors::VectorsOptions::Vectors(named)) => {
                assert!(named.vectors.contains_key(space.id()));
            }
            other => panic!("expected named vectors, got {:?}", other),
        }
    }
}
