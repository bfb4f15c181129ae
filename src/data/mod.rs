// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a DocItem and the tensors the model sees:
//
//   gold answer text
//       │
//       ▼
//   alignment      → fix ±1 character offset drift
//       │
//       ▼
//   span_labeler   → answer span in the pair sequence (or NoSpan)
//       │
//       ▼
//   page_map       → page per context token (concat retrieval)
//       │
//       ▼
//   batcher        → padded tensors on the target device
//
// Each module is responsible for exactly one step.

/// Character offset correction for gold answers
pub mod alignment;

/// Token-space answer labels
pub mod span_labeler;

/// Token → page correspondence for flattened documents
pub mod page_map;

/// Stacks encodings and labels into tensor batches
pub mod batcher;
