pub mod fusion;
pub mod lexical;
pub mod retrieval;
pub mod vector;

pub use fusion::{SourceScore, dedup_same_file, fuse, normalize};
pub use lexical::{DegradedLexicalIndex, LexicalSearchConfig, TantivyLexicalIndex};
pub use retrieval::{RetrievalDefaults, hybrid_fuse};
pub use vector::{FlatVectorIndex, VectorSearchConfig};
