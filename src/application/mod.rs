// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: resolve configuration, build the
// pipeline from the weights directory, run it, persist results.
//
// No tensor code and no printing here; printing belongs to the
// CLI layer, tensors to the ml layer.

/// Configuration resolution and rendering
pub mod config_use_case;

/// Question answering over multi-page documents
pub mod ask_use_case;
