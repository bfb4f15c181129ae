// ============================================================
// Layer 5 — Transformer Q&A Model (Burn)
// ============================================================
// A small encoder-only transformer with a span head:
//
//   tokens + positions → N × [self-attention → FFN] → LayerNorm
//                     → Linear(d_model, 2) → start / end logits
//
// Padding tokens are masked out of self-attention.
//
// BurnQaModel wraps the module and a device behind the QaModel
// trait, so the question-answering core never touches tensors.
// The loss is only computed over items that carry a span label:
//
//   loss = (CE(start_logits, start) + CE(end_logits, end)) / 2

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::ElementConversion,
};

use crate::data::batcher::{QaBatch, QaBatcher, SpanTargets};
use crate::domain::span::SpanLabel;
use crate::domain::traits::{PairEncoding, QaModel, QaModelOutput};
use crate::error::DocQaError;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct TransformerQaConfig {
    pub vocab_size:  usize,
    /// Number of position embeddings; longer pair sequences are rejected.
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl TransformerQaConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerQaModel<B> {
        TransformerQaModel {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.d_model).init(device),
            position_embedding: EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device),
            layers:             (0..self.num_layers).map(|_| self.init_layer(device)).collect(),
            final_norm:         LayerNormConfig::new(self.d_model).init(device),
            span_head:          LinearConfig::new(self.d_model, 2).init(device),
            dropout:            DropoutConfig::new(self.dropout).init(),
            max_seq_len:        self.max_seq_len,
        }
    }

    fn init_layer<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            attention: MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            attention_norm: LayerNormConfig::new(self.d_model).init(device),
            feed_forward: FeedForward {
                expand:  LinearConfig::new(self.d_model, self.d_ff).init(device),
                project: LinearConfig::new(self.d_ff, self.d_model).init(device),
            },
            feed_forward_norm: LayerNormConfig::new(self.d_model).init(device),
            dropout:           DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Position-wise `Linear → GELU → Linear`.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub expand:  Linear<B>,
    pub project: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.project.forward(burn::tensor::activation::gelu(self.expand.forward(x)))
    }
}

/// Post-norm encoder layer; padded positions are never attended to.
#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub attention:         MultiHeadAttention<B>,
    pub attention_norm:    LayerNorm<B>,
    pub feed_forward:      FeedForward<B>,
    pub feed_forward_norm: LayerNorm<B>,
    pub dropout:           Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attended = self
            .attention
            .forward(MhaInput::self_attn(hidden.clone()).mask_pad(mask_pad))
            .context;
        let hidden = self.attention_norm.forward(hidden + self.dropout.forward(attended));

        let transformed = self.feed_forward.forward(hidden.clone());
        self.feed_forward_norm.forward(hidden + self.dropout.forward(transformed))
    }
}

#[derive(Module, Debug)]
pub struct TransformerQaModel<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderLayer<B>>,
    pub final_norm:         LayerNorm<B>,
    pub span_head:          Linear<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

/// Start/end logits as tensors, shape [batch, seq_len] each.
pub struct SpanLogits<B: Backend> {
    pub start_logits: Tensor<B, 2>,
    pub end_logits:   Tensor<B, 2>,
}

impl<B: Backend> TransformerQaModel<B> {
    /// input_ids, mask_pad: [batch, seq_len] → start_logits, end_logits: [batch, seq_len]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, mask_pad: Tensor<B, 2, Bool>) -> SpanLogits<B> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let embedded = self.token_embedding.forward(input_ids)
            + self.position_embedding.forward(positions);

        let hidden = self
            .layers
            .iter()
            .fold(self.dropout.forward(embedded), |hidden, layer| {
                layer.forward(hidden, mask_pad.clone())
            });

        // [batch, seq_len, 2] → two [batch, seq_len] planes
        let logits = self.span_head.forward(self.final_norm.forward(hidden));
        let start_logits = logits
            .clone()
            .slice([0..batch_size, 0..seq_len, 0..1])
            .reshape([batch_size, seq_len]);
        let end_logits = logits
            .slice([0..batch_size, 0..seq_len, 1..2])
            .reshape([batch_size, seq_len]);

        SpanLogits { start_logits, end_logits }
    }

    /// Mean span loss over the labelled rows only.
    pub fn span_loss(&self, logits: &SpanLogits<B>, targets: SpanTargets<B>) -> Tensor<B, 1> {
        let ce = CrossEntropyLossConfig::new().init(&logits.start_logits.device());

        let start = logits.start_logits.clone().select(0, targets.rows.clone());
        let end   = logits.end_logits.clone().select(0, targets.rows);

        (ce.forward(start, targets.start_positions) + ce.forward(end, targets.end_positions)) / 2.0
    }
}

// ─── QaModel adapter ──────────────────────────────────────────────────────────

/// A TransformerQaModel bound to a device.
pub struct BurnQaModel<B: Backend> {
    model:   TransformerQaModel<B>,
    batcher: QaBatcher<B>,
}

impl<B: Backend> BurnQaModel<B> {
    pub fn new(model: TransformerQaModel<B>, device: B::Device) -> Self {
        Self {
            model,
            batcher: QaBatcher::new(device),
        }
    }

    pub fn module(&self) -> &TransformerQaModel<B> {
        &self.model
    }

    fn check_shape(&self, input_ids: &[Vec<u32>], attention_mask: &[Vec<u32>]) -> crate::error::Result<()> {
        let seq_len = input_ids.first().map_or(0, Vec::len);
        if input_ids.len() != attention_mask.len()
            || input_ids.iter().chain(attention_mask).any(|row| row.len() != seq_len)
        {
            return Err(DocQaError::invalid_input("input rows must share one padded length"));
        }
        if seq_len == 0 {
            return Err(DocQaError::invalid_input("cannot run the model on an empty batch"));
        }
        if seq_len > self.model.max_seq_len {
            return Err(DocQaError::invalid_input(format!(
                "sequence of {} tokens exceeds the model maximum of {}",
                seq_len, self.model.max_seq_len
            )));
        }
        Ok(())
    }
}

fn to_rows<B: Backend>(tensor: Tensor<B, 2>) -> crate::error::Result<Vec<Vec<f32>>> {
    let [_, seq_len] = tensor.dims();
    let flat: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| DocQaError::model("reading logits", format!("{e:?}")))?;
    Ok(flat.chunks(seq_len.max(1)).map(<[f32]>::to_vec).collect())
}

impl<B: Backend> QaModel for BurnQaModel<B> {
    fn forward(
        &self,
        input_ids:      &[Vec<u32>],
        attention_mask: &[Vec<u32>],
        labels:         Option<&[SpanLabel]>,
    ) -> crate::error::Result<QaModelOutput> {
        self.check_shape(input_ids, attention_mask)?;

        let pair = PairEncoding {
            input_ids:      input_ids.to_vec(),
            attention_mask: attention_mask.to_vec(),
        };
        let QaBatch { input_ids, mask_pad, targets } = self.batcher.batch(&pair, labels);

        let logits = self.model.forward(input_ids, mask_pad);
        let loss   = targets.map(|targets| {
            self.model
                .span_loss(&logits, targets)
                .into_scalar()
                .elem::<f32>()
        });

        Ok(QaModelOutput {
            start_logits: to_rows(logits.start_logits)?,
            end_logits:   to_rows(logits.end_logits)?,
            loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::span::NoSpanReason;
    use burn::backend::NdArray;

    type B = NdArray;

    fn tiny() -> BurnQaModel<B> {
        let device = Default::default();
        let model  = TransformerQaConfig::new(16, 8, 8, 2, 1, 16)
            .with_dropout(0.0)
            .init::<B>(&device);
        BurnQaModel::new(model, device)
    }

    fn ids() -> (Vec<Vec<u32>>, Vec<Vec<u32>>) {
        (
            vec![vec![0, 4, 2, 2, 5, 6, 2], vec![0, 4, 2, 2, 7, 2, 1]],
            vec![vec![1; 7], vec![1, 1, 1, 1, 1, 1, 0]],
        )
    }

    #[test]
    fn test_output_has_one_row_per_item() {
        let model    = tiny();
        let (ids, m) = ids();
        let out      = model.forward(&ids, &m, None).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.start_logits[1].len(), 7);
        assert_eq!(out.end_logits[0].len(), 7);
        assert!(out.loss.is_none());
    }

    #[test]
    fn test_loss_only_with_a_span_label() {
        let model    = tiny();
        let (ids, m) = ids();

        let labels = [SpanLabel::span(4, 5), SpanLabel::NoSpan(NoSpanReason::AnswerAbsent)];
        let loss   = model.forward(&ids, &m, Some(&labels)).unwrap().loss;
        assert!(loss.map_or(false, |l| l.is_finite() && l > 0.0));

        let none = [SpanLabel::NoSpan(NoSpanReason::Truncated); 2];
        assert!(model.forward(&ids, &m, Some(&none)).unwrap().loss.is_none());
    }

    #[test]
    fn test_rejects_sequences_longer_than_positions() {
        let model = tiny();
        let long  = vec![vec![1u32; 9]];
        let mask  = vec![vec![1u32; 9]];
        assert!(matches!(
            model.forward(&long, &mask, None),
            Err(DocQaError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let model = tiny();
        let ids   = vec![vec![0u32, 4, 2], vec![0u32, 2]];
        let mask  = vec![vec![1u32; 3], vec![1u32; 2]];
        assert!(model.forward(&ids, &mask, None).is_err());
    }
}
