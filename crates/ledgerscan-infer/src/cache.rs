//! LRU cache of chunk embeddings, keyed by chunk text.
//!
//! Table headers and account labels recur from one statement to the next,
//! so most of their chunks are embedded once per process (within the TTL).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

pub const DEFAULT_CAPACITY: usize = 4096;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

struct CachedVector {
    embedding: Array1<f32>,
    stored_at: Instant,
}

struct LruState {
    vectors: HashMap<String, CachedVector>,
    /// Least recently used first.
    recency: VecDeque<String>,
}

impl LruState {
    fn touch(&mut self, text: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == text) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }

    fn forget(&mut self, text: &str) {
        self.vectors.remove(text);
        self.recency.retain(|k| k != text);
    }
}

/// Thread-safe embedding cache.
pub struct EmbeddingCache {
    state: Mutex<LruState>,
    capacity: usize,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(LruState {
                vectors: HashMap::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                recency: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Cached vector for `text`; expired entries are dropped and miss.
    pub fn get(&self, text: &str) -> Option<Array1<f32>> {
        let mut state = self.state.lock();
        let (embedding, expired) = match state.vectors.get(text) {
            Some(entry) => (entry.embedding.clone(), entry.stored_at.elapsed() >= self.ttl),
            None => return None,
        };
        if expired {
            state.forget(text);
            return None;
        }
        state.touch(text);
        Some(embedding)
    }

    pub fn put(&self, text: String, embedding: Array1<f32>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        if state.vectors.contains_key(&text) {
            state.touch(&text);
        } else {
            while state.vectors.len() >= self.capacity {
                match state.recency.pop_front() {
                    Some(oldest) => {
                        state.vectors.remove(&oldest);
                    }
                    None => break,
                }
            }
            state.recency.push_back(text.clone());
        }
        state.vectors.insert(
            text,
            CachedVector {
                embedding,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.state.lock().vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
