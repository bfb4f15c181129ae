// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Loading things from disk:
//
//   config.rs          — YAML model/dataset configuration with
//                        includes, overrides and validation
//
//   tokenizer_store.rs — HuggingFace tokenizer loading, an
//                        in-memory word-level tokenizer, and the
//                        QaTokenizer adapter
//
//   checkpoint.rs      — model architecture + weights from the
//                        `model_weights` directory
//
// Reference: Rust Book §9 (Error Handling)
//            Burn Book §5 (Records)

/// Experiment configuration
pub mod config;

/// Tokenizer loading and adapter
pub mod tokenizer_store;

/// Model weights loading
pub mod checkpoint;
