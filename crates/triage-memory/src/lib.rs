//! Memory backends for similar-incident lookup

mod in_memory;
mod similarity;

pub use in_memory::{InMemoryStore, MemoryStats};
pub use similarity::{SIMILARITY_THRESHOLD, text_similarity};
