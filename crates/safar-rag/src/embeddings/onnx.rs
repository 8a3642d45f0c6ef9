use anyhow::{anyhow, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use crate::config::EncoderConfig;

use super::TextEncoder;

/// Sentence encoder backed by an ONNX transformer (MiniLM or BGE export).
/// Mean-pools the last hidden state over the attention mask and
/// L2-normalizes, so dot product in the vector index equals cosine.
pub struct OnnxEncoder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimension: usize,
    max_length: usize,
    cache: Arc<RwLock<lru::LruCache<String, Vec<f32>>>>,
}

impl OnnxEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        ort::init().with_name("safar_encoder").commit();

        let model_path = resolve_model_file(&config.model_dir)?;
        let model_bytes = std::fs::read(&model_path)
            .map_err(|e| anyhow!("Failed to read model {}: {:?}", model_path.display(), e))?;

        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let session = Session::builder()
            .map_err(|e| anyhow!("Session builder: {:?}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Optimization level: {:?}", e))?
            .with_intra_threads(num_threads)
            .map_err(|e| anyhow!("Intra threads: {:?}", e))?
            .with_inter_threads(1)
            .map_err(|e| anyhow!("Inter threads: {:?}", e))?
            .with_memory_pattern(true)
            .map_err(|e| anyhow!("Memory pattern: {:?}", e))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("Failed to load model: {:?}", e))?;

        let tokenizer_path = config.model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {:?}", tokenizer_path.display(), e))?;

        let cache_size = NonZeroUsize::new(config.cache_size.max(1))
            .ok_or_else(|| anyhow!("Invalid cache size"))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimension: config.dimension,
            max_length: config.max_length.min(512),
            cache: Arc::new(RwLock::new(lru::LruCache::new(cache_size))),
        })
    }

    fn run_inference(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {:?}", e))?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        ids.truncate(self.max_length);
        let seq_len = ids.len();

        let mut mask = vec![1i64; seq_len];
        ids.resize(self.max_length, 0);
        mask.resize(self.max_length, 0);
        let token_type: Vec<i64> = vec![0; self.max_length];

        let shape = vec![1, self.max_length];
        let input_ids = Value::from_array((shape.clone(), ids))
            .map_err(|e| anyhow!("input_ids tensor: {:?}", e))?;
        let attention_mask = Value::from_array((shape.clone(), mask.clone()))
            .map_err(|e| anyhow!("attention_mask tensor: {:?}", e))?;
        let token_type_ids = Value::from_array((shape, token_type))
            .map_err(|e| anyhow!("token_type_ids tensor: {:?}", e))?;

        let mut session = self.session.lock();
        let needs_token_type = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let outputs = if needs_token_type {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        }
        .map_err(|e| anyhow!("Inference failed: {:?}", e))?;

        let output_name = outputs
            .iter()
            .find(|(name, _)| *name == "last_hidden_state" || *name == "token_embeddings")
            .map(|(name, _)| name.to_string())
            .or_else(|| outputs.iter().next().map(|(name, _)| name.to_string()))
            .ok_or_else(|| anyhow!("Model produced no outputs"))?;

        let (out_shape, data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("Failed to extract output '{}': {:?}", output_name, e))?;

        if out_shape.len() != 3 {
            return Err(anyhow!(
                "Unexpected output rank {} from '{}'",
                out_shape.len(),
                output_name
            ));
        }
        let out_seq_len = out_shape[1] as usize;
        let hidden_dim = out_shape[2] as usize;

        let mut pooled = vec![0.0f32; hidden_dim];
        let mut mask_sum = 0.0f32;
        for pos in 0..out_seq_len {
            let mask_val = if pos < mask.len() { mask[pos] as f32 } else { 0.0 };
            if mask_val > 0.0 {
                mask_sum += mask_val;
                let offset = pos * hidden_dim;
                for dim in 0..hidden_dim {
                    pooled[dim] += data[offset + dim] * mask_val;
                }
            }
        }
        if mask_sum > 0.0 {
            for value in &mut pooled {
                *value /= mask_sum;
            }
        }

        Ok(l2_normalize(pooled))
    }
}

impl TextEncoder for OnnxEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(cached) = self.cache.write().get(trimmed) {
            return Ok(cached.clone());
        }

        let embedding = self.run_inference(trimmed)?;
        self.cache
            .write()
            .put(trimmed.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn resolve_model_file(model_dir: &Path) -> Result<std::path::PathBuf> {
    for candidate in ["model_quantized.onnx", "model_O4.onnx", "model.onnx"] {
        let path = model_dir.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(anyhow!(
        "No ONNX model file found under {}",
        model_dir.display()
    ))
}

fn l2_normalize(mut vec: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}
