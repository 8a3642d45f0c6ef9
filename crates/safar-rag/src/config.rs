use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub graph: GraphConfig,
    pub encoder: EncoderConfig,
    pub classifier: ClassifierConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Base URL of the graph HTTP endpoint, e.g. "http://localhost:7474".
    pub endpoint: String,
    pub database: String,
    pub username: String,
    /// Environment variable holding the graph password.
    pub password_env: String,
    /// Name of the hotel vector index in the graph store.
    pub hotel_vector_index: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub model_dir: PathBuf,
    pub dimension: usize,
    pub max_length: usize,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Absolute score below which the rule classifier defers to the LLM.
    pub min_score_to_accept: f64,
    /// Required ratio of top score to runner-up score.
    pub margin_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    /// Vector search fetches `overfetch_factor * top_k` candidates so enough
    /// survive the aggregate post-filter.
    pub overfetch_factor: usize,
    pub max_review_snippets: usize,
    pub snippet_max_len: usize,
    pub fuzzy_city_cutoff: f64,
    pub fuzzy_hotel_cutoff: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    /// Hard deadline per LLM call; a timeout degrades like any other error.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub use_baseline: bool,
    pub use_embeddings: bool,
    pub use_llm_extraction: bool,
    pub use_llm_intent_fallback: bool,
}

impl EngineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.graph.endpoint.is_empty() {
            return Err("graph.endpoint must not be empty".into());
        }
        if self.encoder.dimension == 0 {
            return Err("encoder.dimension must be > 0".into());
        }
        if self.encoder.max_length == 0 {
            return Err("encoder.max_length must be > 0".into());
        }
        if self.classifier.min_score_to_accept < 0.0 {
            return Err("classifier.min_score_to_accept must be >= 0".into());
        }
        if self.classifier.margin_ratio < 1.0 {
            return Err("classifier.margin_ratio must be >= 1.0".into());
        }
        if self.retrieval.default_limit == 0 {
            return Err("retrieval.default_limit must be > 0".into());
        }
        if self.retrieval.overfetch_factor == 0 {
            return Err("retrieval.overfetch_factor must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.fuzzy_city_cutoff) {
            return Err("retrieval.fuzzy_city_cutoff must be in [0.0, 1.0]".into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.fuzzy_hotel_cutoff) {
            return Err("retrieval.fuzzy_hotel_cutoff must be in [0.0, 1.0]".into());
        }
        if !(0.0..=1.0).contains(&(self.llm.top_p as f64)) {
            return Err("llm.top_p must be in [0.0, 1.0]".into());
        }
        if self.llm.timeout_secs == 0 {
            return Err("llm.timeout_secs must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("safar-rag");

        let model_dir = if Path::new("models").exists() {
            PathBuf::from("models")
        } else if let Ok(env_path) = std::env::var("MODEL_PATH") {
            PathBuf::from(env_path)
        } else {
            data_dir.join("models")
        };

        // BGE-base produces 768-dim vectors, MiniLM 384.
        let bge_available = model_dir.join("bge-base-en-v1.5").exists();
        let (dimension, index) = if bge_available {
            (768, "hotel_embedding_bge_idx")
        } else {
            (384, "hotel_embedding_minilm_idx")
        };

        Self {
            graph: GraphConfig {
                endpoint: "http://localhost:7474".into(),
                database: "neo4j".into(),
                username: "neo4j".into(),
                password_env: "NEO4J_PASSWORD".into(),
                hotel_vector_index: index.into(),
            },
            encoder: EncoderConfig {
                model_dir,
                dimension,
                max_length: 256,
                cache_size: 1000,
            },
            classifier: ClassifierConfig {
                min_score_to_accept: 1.0,
                margin_ratio: 1.25,
            },
            retrieval: RetrievalConfig {
                default_limit: 10,
                overfetch_factor: 5,
                max_review_snippets: 2,
                snippet_max_len: 200,
                fuzzy_city_cutoff: 0.9,
                fuzzy_hotel_cutoff: 0.7,
            },
            llm: LlmConfig {
                endpoint: "https://router.huggingface.co/v1/chat/completions".into(),
                model: "meta-llama/Llama-3.1-8B-Instruct".into(),
                api_key_env: "HF_API_KEY".into(),
                max_tokens: 512,
                temperature: 0.0,
                top_p: 0.9,
                timeout_secs: 30,
            },
            features: FeatureFlags {
                use_baseline: true,
                use_embeddings: true,
                use_llm_extraction: false,
                use_llm_intent_fallback: true,
            },
        }
    }
}
