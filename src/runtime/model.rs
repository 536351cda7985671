//! Model components: backbone, adapter, head
//!
//! The classifier is a hashing-embedding text model: the backbone hashes
//! tokens into a fixed vocabulary and embeds them, the adapter pools token
//! embeddings into one vector per text, and the head maps the pooled vector
//! to a bullying probability.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::weights::{by_name, StateDict, TensorState};
use crate::{Error, Result};

/// Text-to-token-id transformation. Owned by the backbone and shared with
/// the data module so both sides tokenize identically.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    pub vocab_size: usize,
    pub max_length: usize,
}

impl Transformation {
    pub fn encode(&self, text: &str) -> Vec<usize> {
        text.split_whitespace()
            .take(self.max_length)
            .map(|token| hash_token(token) as usize % self.vocab_size)
            .collect()
    }
}

// FNV-1a, stable across platforms and runs.
fn hash_token(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Token-hashing embedding backbone.
#[derive(Debug, Clone)]
pub struct HashingBackbone {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub max_length: usize,
    embedding: Array2<f32>,
}

impl HashingBackbone {
    pub fn new(vocab_size: usize, embedding_dim: usize, max_length: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = (1.0 / embedding_dim as f32).sqrt();
        let embedding = Array2::from_shape_fn((vocab_size, embedding_dim), |_| {
            rng.gen_range(-scale..scale)
        });
        Self {
            vocab_size,
            embedding_dim,
            max_length,
            embedding,
        }
    }

    pub fn transformation(&self) -> Transformation {
        Transformation {
            vocab_size: self.vocab_size,
            max_length: self.max_length,
        }
    }

    /// Embed one encoded text: (tokens, embedding_dim). Empty texts produce
    /// a single zero row so downstream pooling stays well-defined.
    pub fn forward(&self, token_ids: &[usize]) -> Array2<f32> {
        if token_ids.is_empty() {
            return Array2::zeros((1, self.embedding_dim));
        }
        let mut out = Array2::zeros((token_ids.len(), self.embedding_dim));
        for (row, &id) in token_ids.iter().enumerate() {
            out.row_mut(row).assign(&self.embedding.row(id));
        }
        out
    }
}

/// Pools per-token embeddings into one vector per text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeanPoolAdapter;

impl MeanPoolAdapter {
    pub fn forward(&self, token_embeddings: &Array2<f32>) -> Array1<f32> {
        token_embeddings.mean_axis(Axis(0)).unwrap_or_else(|| {
            Array1::zeros(token_embeddings.ncols())
        })
    }
}

/// Linear head with sigmoid activation producing a probability.
#[derive(Debug, Clone)]
pub struct SigmoidHead {
    pub weight: Array1<f32>,
    pub bias: f32,
}

impl SigmoidHead {
    pub fn new(in_features: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = (1.0 / in_features as f32).sqrt();
        let weight = Array1::from_shape_fn(in_features, |_| rng.gen_range(-scale..scale));
        Self { weight, bias: 0.0 }
    }

    pub fn forward(&self, features: &Array1<f32>) -> f32 {
        sigmoid(self.weight.dot(features) + self.bias)
    }
}

pub fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// The full classifier: backbone -> adapter -> head.
#[derive(Debug, Clone)]
pub struct BinaryTextClassificationModel {
    pub backbone: HashingBackbone,
    pub adapter: MeanPoolAdapter,
    pub head: SigmoidHead,
}

impl BinaryTextClassificationModel {
    pub fn new(backbone: HashingBackbone, adapter: MeanPoolAdapter, head: SigmoidHead) -> Self {
        Self {
            backbone,
            adapter,
            head,
        }
    }

    pub fn transformation(&self) -> Transformation {
        self.backbone.transformation()
    }

    /// Pooled feature vector for one text.
    pub fn features(&self, text: &str) -> Array1<f32> {
        let token_ids = self.transformation().encode(text);
        let embedded = self.backbone.forward(&token_ids);
        self.adapter.forward(&embedded)
    }

    /// Bullying probability per input text.
    pub fn forward(&self, texts: &[String]) -> Array1<f32> {
        texts
            .iter()
            .map(|text| self.head.forward(&self.features(text)))
            .collect()
    }

    pub fn state_dict(&self) -> StateDict {
        vec![
            TensorState::new(
                "backbone.embedding",
                vec![self.backbone.vocab_size, self.backbone.embedding_dim],
                self.backbone.embedding.iter().copied().collect(),
            ),
            TensorState::new(
                "head.weight",
                vec![self.head.weight.len()],
                self.head.weight.to_vec(),
            ),
            TensorState::new("head.bias", vec![1], vec![self.head.bias]),
        ]
    }

    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let index = by_name(state);
        let embedding = index
            .get("backbone.embedding")
            .ok_or_else(|| Error::Serialization("state missing backbone.embedding".into()))?;
        let expected = [self.backbone.vocab_size, self.backbone.embedding_dim];
        if embedding.shape != expected {
            return Err(Error::Serialization(format!(
                "backbone.embedding shape mismatch: expected {:?}, got {:?}",
                expected, embedding.shape
            )));
        }
        self.backbone.embedding = Array2::from_shape_vec(
            (self.backbone.vocab_size, self.backbone.embedding_dim),
            embedding.data.clone(),
        )
        .map_err(|e| Error::Serialization(format!("Invalid embedding data: {e}")))?;

        let weight = index
            .get("head.weight")
            .ok_or_else(|| Error::Serialization("state missing head.weight".into()))?;
        if weight.data.len() != self.head.weight.len() {
            return Err(Error::Serialization(format!(
                "head.weight length mismatch: expected {}, got {}",
                self.head.weight.len(),
                weight.data.len()
            )));
        }
        self.head.weight = Array1::from_vec(weight.data.clone());

        let bias = index
            .get("head.bias")
            .ok_or_else(|| Error::Serialization("state missing head.bias".into()))?;
        self.head.bias = *bias
            .data
            .first()
            .ok_or_else(|| Error::Serialization("head.bias is empty".into()))?;

        Ok(())
    }
}
