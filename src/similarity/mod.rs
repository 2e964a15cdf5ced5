//! Scoring strategies used by the acceptance engine.
//!
//! Lexical overlap compares a candidate's related queries with the queries
//! approved so far. The content kernel compares snippet collections through
//! TF-IDF centroids.

pub mod kernel;
pub mod lexical;

pub use kernel::{content_kernel, ContentKernel, TfIdfKernel};
pub use lexical::{lexical_overlap, LexicalMode, NgramIndex};
