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

use crate::modules::MaskedPooling;
use crate::MtlError;
use tch::Tensor;

/// # Pair encoding without cross-attention
///
/// Pools both sequences independently and combines the pooled vectors `a` and `b` as
/// `[a, b, |a - b|, a * b]`. Linear in the sequence lengths.
#[derive(Debug, Clone, Copy)]
pub struct SimplePairEncoder {
    pooling: MaskedPooling,
    encoding_dim: i64,
}

impl SimplePairEncoder {
    pub fn new(encoding_dim: i64) -> SimplePairEncoder {
        SimplePairEncoder {
            pooling: MaskedPooling::new(),
            encoding_dim,
        }
    }

    pub fn output_dim(&self) -> i64 {
        4 * self.encoding_dim
    }

    /// Forward pass through the pair encoder
    ///
    /// # Arguments
    ///
    /// * `sequence_a` - Tensor of shape (*batch size*, *length a*, *encoding dim*)
    /// * `mask_a` - Tensor of shape (*batch size*, *length a*)
    /// * `sequence_b` - Tensor of shape (*batch size*, *length b*, *encoding dim*)
    /// * `mask_b` - Tensor of shape (*batch size*, *length b*)
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, 4 x *encoding dim*)
    pub fn forward(
        &self,
        sequence_a: &Tensor,
        mask_a: &Tensor,
        sequence_b: &Tensor,
        mask_b: &Tensor,
    ) -> Result<Tensor, MtlError> {
        for sequence in [sequence_a, sequence_b] {
            let width = *sequence.size().last().unwrap_or(&0);
            if width != self.encoding_dim {
                return Err(MtlError::ShapeMismatchError(format!(
                    "Expected encodings of width {}, got {}",
                    self.encoding_dim, width
                )));
            }
        }
        let a = self.pooling.forward(sequence_a, mask_a)?;
        let b = self.pooling.forward(sequence_b, mask_b)?;
        Ok(Tensor::cat(&[&a, &b, &(&a - &b).abs(), &(&a * &b)], 1))
    }
}
