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

use crate::common::masking::{bias_from_mask, check_mask};
use crate::MtlError;
use tch::Tensor;

/// # Masked max-pooling over time
///
/// Reduces a (*batch size*, *sequence length*, *width*) sequence to a (*batch size*, *width*)
/// vector by taking the elementwise maximum over the unmasked time steps. Padded positions
/// are excluded through an additive bias computed from the mask, so their feature values
/// never reach the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskedPooling;

impl MaskedPooling {
    pub fn new() -> MaskedPooling {
        MaskedPooling
    }

    /// Forward pass through the pooling layer
    ///
    /// # Arguments
    ///
    /// * `sequence` - Tensor of shape (*batch size*, *sequence length*, *width*)
    /// * `mask` - Tensor of shape (*batch size*, *sequence length*), 1 for real tokens and 0 for padding
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *width*)
    pub fn forward(&self, sequence: &Tensor, mask: &Tensor) -> Result<Tensor, MtlError> {
        check_mask(sequence, mask)?;
        let bias = bias_from_mask(mask, sequence.kind())?.unsqueeze(-1);
        Ok((sequence + bias).max_dim(1, false).0)
    }
}
