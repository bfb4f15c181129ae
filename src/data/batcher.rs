// ============================================================
// Layer 4 — Q&A Batcher
// ============================================================
// Turns a padded PairEncoding (plus optional span labels) into
// tensors on the target device.
//
//   input_ids       [N, S]  Int
//   mask_pad        [N, S]  Bool   true where the token is padding
//   start/end       [M]     Int    only the M items with a span
//   labelled        [M]     Int    row index of each labelled item
//
// Rows are flattened then reshaped:
//   [r1_t1, ..., r1_tS, r2_t1, ..., rN_tS] → [N, S]
//
// Items whose label is NoSpan are left out of the loss tensors
// entirely; there is no sentinel position.

use burn::prelude::*;

use crate::domain::span::SpanLabel;
use crate::domain::traits::PairEncoding;

#[derive(Debug, Clone)]
pub struct QaBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,

    pub mask_pad: Tensor<B, 2, Bool>,

    /// Present when at least one item has a span label.
    pub targets: Option<SpanTargets<B>>,
}

/// Gold start/end positions of the labelled rows.
#[derive(Debug, Clone)]
pub struct SpanTargets<B: Backend> {
    pub rows:            Tensor<B, 1, Int>,
    pub start_positions: Tensor<B, 1, Int>,
    pub end_positions:   Tensor<B, 1, Int>,
}

/// Holds the device tensors are created on.
#[derive(Clone, Debug)]
pub struct QaBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> QaBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// `pair` must be non-empty and padded to one length.
    pub fn batch(&self, pair: &PairEncoding, labels: Option<&[SpanLabel]>) -> QaBatch<B> {
        let batch_size = pair.len();
        let seq_len    = pair.input_ids.first().map_or(0, Vec::len);

        let input_flat: Vec<i32> = pair
            .input_ids
            .iter()
            .flat_map(|row| row.iter().map(|&id| id as i32))
            .collect();
        let mask_flat: Vec<i32> = pair
            .attention_mask
            .iter()
            .flat_map(|row| row.iter().map(|&m| m as i32))
            .collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len]);
        let mask_pad = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
            .equal_elem(0);

        let targets = labels.and_then(|labels| self.targets(labels));

        QaBatch {
            input_ids,
            mask_pad,
            targets,
        }
    }

    fn targets(&self, labels: &[SpanLabel]) -> Option<SpanTargets<B>> {
        let mut rows   = Vec::new();
        let mut starts = Vec::new();
        let mut ends   = Vec::new();

        for (row, label) in labels.iter().enumerate() {
            if let Some((start, end)) = label.positions() {
                rows.push(row as i32);
                starts.push(start as i32);
                ends.push(end as i32);
            }
        }

        if rows.is_empty() {
            return None;
        }

        Some(SpanTargets {
            rows:            Tensor::<B, 1, Int>::from_ints(rows.as_slice(), &self.device),
            start_positions: Tensor::<B, 1, Int>::from_ints(starts.as_slice(), &self.device),
            end_positions:   Tensor::<B, 1, Int>::from_ints(ends.as_slice(), &self.device),
        })
    }
}
