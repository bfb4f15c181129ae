// ============================================================
// Layer 5 — ML Layer
// ============================================================
// model.rs is the only file of this layer that uses Burn (tensor
// batching lives in data/batcher.rs). The rest works on plain
// logit rows through the QaModel trait, so it can be tested
// without a device.
//
//   model.rs     — transformer encoder with a span head, and the
//                  BurnQaModel adapter
//   decoder.rs   — logits → answer text + confidence
//   retrieval.rs — page retrieval strategies
//   doc_qa.rs    — the multi-page QA pipeline
//
// Reference: Burn Book §3 (Building Blocks)
//            Devlin et al. (2019) BERT

/// Transformer encoder Q&A model
pub mod model;

/// Answer span decoding
pub mod decoder;

/// oracle / concat / logits / none page selection
pub mod retrieval;

/// Multi-page question answering pipeline
pub mod doc_qa;
