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

use crate::common::dropout::Dropout;
use crate::common::masking::get_text_field_mask;
use crate::modules::{Highway, SequenceEncoder, TextFieldEmbedder};
use crate::MtlError;
use std::borrow::Borrow;
use tch::nn::ModuleT;
use tch::{nn, Tensor};

/// Container for the phrase encoder output.
pub struct PhraseEncoderOutput {
    /// Encoded tokens of shape (*batch size*, *sequence length*, *encoding dim*)
    pub encoded: Tensor,
    /// Float mask of shape (*batch size*, *sequence length*) derived from the token ids
    pub mask: Tensor,
}

/// # Token ids to contextual encodings
///
/// Embeds the tokens, applies the highway layers and runs the phrase encoder:
/// `dropout(phrase_layer(highway(embed(ids)), mask))`.
pub struct PhraseEncoder {
    text_field_embedder: Box<dyn TextFieldEmbedder>,
    highway_layer: Highway,
    phrase_layer: Box<dyn SequenceEncoder>,
    dropout: Dropout,
    mask_lstms: bool,
}

impl PhraseEncoder {
    /// Build a new `PhraseEncoder`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the highway layers
    /// * `text_field_embedder` - token embedder, its output dimension must match the phrase layer input dimension
    /// * `num_highway_layers` - number of highway layers between the embedder and the phrase layer
    /// * `phrase_layer` - sequence encoder applied to the embedded tokens
    /// * `dropout` - dropout probability applied to the encodings, 0 disables it
    /// * `mask_lstms` - pass the token mask to the phrase layer
    pub fn new<'p, P>(
        p: P,
        text_field_embedder: Box<dyn TextFieldEmbedder>,
        num_highway_layers: i64,
        phrase_layer: Box<dyn SequenceEncoder>,
        dropout: f64,
        mask_lstms: bool,
    ) -> Result<PhraseEncoder, MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        if text_field_embedder.output_dim() != phrase_layer.input_dim() {
            return Err(MtlError::InvalidConfigurationError(format!(
                "The output dimension of the text_field_embedder must match the input dimension of the phrase_encoder. Found {} and {} respectively.",
                text_field_embedder.output_dim(),
                phrase_layer.input_dim()
            )));
        }
        if num_highway_layers < 0 {
            return Err(MtlError::InvalidConfigurationError(format!(
                "num_highway_layers must be non-negative, got {num_highway_layers}"
            )));
        }
        let highway_layer = Highway::new(
            p.borrow() / "highway_layer",
            text_field_embedder.output_dim(),
            num_highway_layers,
        );

        Ok(PhraseEncoder {
            text_field_embedder,
            highway_layer,
            phrase_layer,
            dropout: Dropout::new(dropout)?,
            mask_lstms,
        })
    }

    /// Width of the encodings.
    pub fn output_dim(&self) -> i64 {
        self.phrase_layer.output_dim()
    }

    /// Forward pass through the phrase encoder
    ///
    /// # Arguments
    ///
    /// * `token_ids` - Tensor of shape (*batch size*, *sequence length*), padded with 0
    /// * `train` - boolean flag to turn on/off the dropout layers
    pub fn forward_t(&self, token_ids: &Tensor, train: bool) -> Result<PhraseEncoderOutput, MtlError> {
        if token_ids.dim() != 2 {
            return Err(MtlError::ShapeMismatchError(format!(
                "Expected token ids of shape (batch size, sequence length), got {:?}",
                token_ids.size()
            )));
        }
        let mask = get_text_field_mask(token_ids);
        let embedded = self
            .highway_layer
            .forward(&self.text_field_embedder.forward(token_ids));
        let lstm_mask = if self.mask_lstms { Some(&mask) } else { None };
        let encoded = self
            .dropout
            .forward_t(&self.phrase_layer.forward_t(&embedded, lstm_mask, train), train);
        Ok(PhraseEncoderOutput { encoded, mask })
    }
}
