use crc32fast::Hasher;
use std::sync::atomic::{AtomicU32, Ordering};

/// Generate a document seed from a document key using CRC32
pub fn document_seed(key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sequential id generator for document nodes.
///
/// Ids look like `MPFootnote:1a2b3c4d-7`. The counter is atomic so a shared
/// generator can be used from `&self` plugin hooks.
#[derive(Debug)]
pub struct IdGenerator {
    seed: String,
    count: AtomicU32,
}

impl IdGenerator {
    pub fn new(document_key: &str) -> Self {
        Self::from_seed(document_seed(document_key))
    }

    pub fn from_seed(seed: String) -> Self {
        Self {
            seed,
            count: AtomicU32::new(0),
        }
    }

    /// Generate the next id with the given type prefix
    pub fn next_id(&self, prefix: &str) -> String {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}:{}-{}", prefix, self.seed, n)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

impl Clone for IdGenerator {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed.clone(),
            count: AtomicU32::new(self.count.load(Ordering::Relaxed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_seed_is_stable() {
        assert_eq!(document_seed("manuscript-1"), document_seed("manuscript-1"));
        assert_ne!(document_seed("manuscript-1"), document_seed("manuscript-2"));
    }

    #[test]
    fn test_sequential_ids() {
        let gen = IdGenerator::new("manuscript-1");

        let id1 = gen.next_id("MPFootnote");
        let id2 = gen.next_id("MPSection");

        assert!(id1.starts_with("MPFootnote:"));
        assert!(id1.ends_with("-1"));
        assert!(id2.starts_with("MPSection:"));
        assert!(id2.ends_with("-2"));
        assert!(id1.contains(gen.seed()));
    }
}
