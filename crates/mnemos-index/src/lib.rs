//! `mnemos-index` – local text search index.
//!
//! A self-contained TF-IDF index that gives every memory store semantic-ish
//! recall without an external embedding service.
//!
//! # Modules
//!
//! - [`tokenizer`] – [`tokenize`][tokenizer::tokenize]: splits Latin-script
//!   text on non-alphanumeric boundaries and emits every CJK character as its
//!   own token.
//! - [`vectorizer`] – [`Vectorizer`][vectorizer::Vectorizer]: builds a sorted
//!   vocabulary and IDF weights from a corpus, turns text into L2-normalized
//!   vectors, and answers cosine top-K queries over its cached documents.

pub mod tokenizer;
pub mod vectorizer;

pub use tokenizer::{is_cjk, tokenize};
pub use vectorizer::{SearchHit, Vectorizer, cosine_similarity, cosine_with_norms};
