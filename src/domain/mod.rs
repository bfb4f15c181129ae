// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing the problem:
// documents and batches, answer spans in text and token space,
// and the tokenizer/model seams the core is written against.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - NO concrete tokenizer or model
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Questions, pages, items and batches
pub mod document;

// Text-space and token-space answer spans
pub mod span;

// Tokenizer / model abstractions and their data
pub mod traits;
