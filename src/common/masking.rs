// Copyright 2019 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mask helpers shared by the pooling and attention layers.
//!
//! Masks are `(batch size, sequence length)` tensors with value 1 for real tokens and 0 for
//! padding. None of the functions below modify the mask they are given.

use crate::common::kind::get_min_value;
use crate::MtlError;
use tch::{Kind, Tensor};

/// Token id used for padding positions.
pub const PADDING_INDEX: i64 = 0;

/// Builds a float mask from a `(batch size, sequence length)` tensor of token ids, marking
/// every position that does not hold the padding index.
pub fn get_text_field_mask(token_ids: &Tensor) -> Tensor {
    token_ids.ne(PADDING_INDEX).to_kind(Kind::Float)
}

/// Checks that a mask is usable for the given sequence:
/// - the mask shape matches the first two dimensions of the sequence,
/// - every batch row has at least one unmasked position.
pub fn check_mask(sequence: &Tensor, mask: &Tensor) -> Result<(), MtlError> {
    let sequence_shape = sequence.size();
    let mask_shape = mask.size();
    if mask_shape.len() != 2 || sequence_shape.len() < 2 || sequence_shape[..2] != mask_shape[..]
    {
        return Err(MtlError::ShapeMismatchError(format!(
            "Mask of shape {mask_shape:?} does not match sequence of shape {sequence_shape:?}"
        )));
    }
    if mask_shape[0] > 0 {
        let min_row_count = mask
            .sum_dim_intlist([1].as_slice(), false, Kind::Float)
            .min()
            .double_value(&[]);
        if min_row_count <= 0.0 {
            return Err(MtlError::DegenerateMaskError(
                "At least one batch row has no unmasked position".to_string(),
            ));
        }
    }
    Ok(())
}

/// Additive bias derived from a mask: 0 at unmasked positions and the most negative finite
/// value of `kind` at masked positions.
pub fn bias_from_mask(mask: &Tensor, kind: Kind) -> Result<Tensor, MtlError> {
    let min_value = get_min_value(kind)?;
    Ok(mask
        .zeros_like()
        .to_kind(kind)
        .masked_fill(&mask.eq(0.0), min_value))
}

fn broadcast_mask(mask: &Tensor, target: &Tensor) -> Tensor {
    let mut mask = mask.to_kind(target.kind());
    while mask.dim() < target.dim() {
        mask = mask.unsqueeze(1);
    }
    mask
}

/// Softmax over the last dimension of `vector`, restricted to the positions where `mask` is 1.
///
/// The mask is broadcast by inserting dimensions after the batch dimension, so that a
/// `(batch size, length)` mask can be applied to a `(batch size, rows, length)` tensor.
/// Masked positions receive a probability of exactly 0.
pub fn masked_softmax(vector: &Tensor, mask: &Tensor) -> Result<Tensor, MtlError> {
    let mask = broadcast_mask(mask, vector);
    let min_value = get_min_value(vector.kind())?;
    let masked_vector = vector.masked_fill(&mask.eq(0.0), min_value);
    Ok(masked_vector.softmax(-1, vector.kind()) * mask)
}

/// Replaces the values of `tensor` at masked positions by `replace_with`.
pub fn replace_masked_values(tensor: &Tensor, mask: &Tensor, replace_with: f64) -> Tensor {
    let mask = broadcast_mask(mask, tensor);
    tensor.masked_fill(&mask.eq(0.0), replace_with)
}

/// Weighted sum of the rows of `matrix` (*batch size*, *length*, *dim*) with weights
/// `attention` of shape (*batch size*, *length*) or (*batch size*, *rows*, *length*).
pub fn weighted_sum(matrix: &Tensor, attention: &Tensor) -> Tensor {
    if attention.dim() == 2 {
        attention.unsqueeze(1).matmul(matrix).squeeze_dim(1)
    } else {
        attention.matmul(matrix)
    }
}
