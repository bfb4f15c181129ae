//! Extractive question answering over multi-page documents.
//!
//! Layers, outermost first:
//!
//! 1. `cli`         — argument parsing, printing
//! 2. `application` — use cases
//! 3. `domain`      — items, spans, tokenizer/model traits
//! 4. `data`        — alignment, span labels, page maps, tensor batches
//! 5. `ml`          — model, decoding, page retrieval, the `DocQa` pipeline
//! 6. `infra`       — configuration, tokenizer and weights loading

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;

pub use domain::document::{Context, DocBatch, DocItem};
pub use domain::span::{NoSpanReason, SpanLabel, TextSpan};
pub use error::{DocQaError, Result};
pub use infra::config::DocQaConfig;
pub use ml::doc_qa::{DocQa, DocQaOutput, ModelOutputs, Prediction};
pub use ml::retrieval::PageRetrieval;
