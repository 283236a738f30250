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

use crate::encoders::phrase::PhraseEncoder;
use crate::encoders::simple_pair::SimplePairEncoder;
use crate::modules::MaskedPooling;
use crate::MtlError;
use tch::Tensor;

/// # Sentence encoder without a task head
///
/// Encodes token ids with a [`PhraseEncoder`](crate::encoders::PhraseEncoder) and max-pools
/// the encodings over the unmasked tokens.
pub struct HeadlessSentEncoder {
    phrase_encoder: PhraseEncoder,
    pooling: MaskedPooling,
}

impl HeadlessSentEncoder {
    pub fn new(phrase_encoder: PhraseEncoder) -> HeadlessSentEncoder {
        HeadlessSentEncoder {
            phrase_encoder,
            pooling: MaskedPooling::new(),
        }
    }

    pub fn output_dim(&self) -> i64 {
        self.phrase_encoder.output_dim()
    }

    /// Forward pass through the sentence encoder
    ///
    /// # Arguments
    ///
    /// * `token_ids` - Tensor of shape (*batch size*, *sequence length*), padded with 0
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *encoding dim*)
    pub fn forward_t(&self, token_ids: &Tensor, train: bool) -> Result<Tensor, MtlError> {
        let encoder_output = self.phrase_encoder.forward_t(token_ids, train)?;
        self.pooling
            .forward(&encoder_output.encoded, &encoder_output.mask)
    }
}

/// # Pair encoder without cross-attention and without a task head
///
/// Both sequences go through the same [`PhraseEncoder`](crate::encoders::PhraseEncoder) and
/// are combined by a [`SimplePairEncoder`](crate::encoders::SimplePairEncoder).
pub struct HeadlessPairEncoder {
    phrase_encoder: PhraseEncoder,
    pair_encoder: SimplePairEncoder,
}

impl HeadlessPairEncoder {
    pub fn new(phrase_encoder: PhraseEncoder) -> HeadlessPairEncoder {
        let pair_encoder = SimplePairEncoder::new(phrase_encoder.output_dim());
        HeadlessPairEncoder {
            phrase_encoder,
            pair_encoder,
        }
    }

    pub fn output_dim(&self) -> i64 {
        self.pair_encoder.output_dim()
    }

    /// Forward pass through the pair encoder
    ///
    /// # Arguments
    ///
    /// * `input_1` - token ids of the first sequences, shape (*batch size*, *length 1*)
    /// * `input_2` - token ids of the second sequences, shape (*batch size*, *length 2*)
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, 4 x *encoding dim*)
    pub fn forward_t(
        &self,
        input_1: &Tensor,
        input_2: &Tensor,
        train: bool,
    ) -> Result<Tensor, MtlError> {
        let encoded_1 = self.phrase_encoder.forward_t(input_1, train)?;
        let encoded_2 = self.phrase_encoder.forward_t(input_2, train)?;
        self.pair_encoder.forward(
            &encoded_1.encoded,
            &encoded_1.mask,
            &encoded_2.encoded,
            &encoded_2.mask,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modules::{
        BasicTextFieldEmbedder, PassThroughEncoder, SequenceEncoderConfig, SequenceEncoderType,
    };
    use tch::{nn, Device, Kind};

    fn phrase_encoder(vs: &nn::VarStore, embedding_dim: i64) -> anyhow::Result<PhraseEncoder> {
        let embedder = BasicTextFieldEmbedder::new(vs.root() / "embedder", 20, embedding_dim);
        Ok(PhraseEncoder::new(
            vs.root() / "phrase",
            Box::new(embedder),
            0,
            Box::new(PassThroughEncoder::new(embedding_dim)),
            0.0,
            true,
        )?)
    }

    #[test]
    fn sentence_and_pair_widths() -> anyhow::Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let sent_encoder = HeadlessSentEncoder::new(phrase_encoder(&vs, 4)?);
        let pair_encoder = HeadlessPairEncoder::new(phrase_encoder(&vs, 4)?);
        assert_eq!(sent_encoder.output_dim(), 4);
        assert_eq!(pair_encoder.output_dim(), 16);

        let input_1 = Tensor::from_slice(&[3i64, 5, 0, 7, 0, 0]).view([2, 3]);
        let input_2 = Tensor::from_slice(&[1i64, 2, 8, 9]).view([2, 2]);
        assert_eq!(sent_encoder.forward_t(&input_1, false)?.size(), vec![2, 4]);
        assert_eq!(
            pair_encoder.forward_t(&input_1, &input_2, false)?.size(),
            vec![2, 16]
        );
        Ok(())
    }

    #[test]
    fn sentence_encoding_ignores_padding_tokens() -> anyhow::Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let sent_encoder = HeadlessSentEncoder::new(phrase_encoder(&vs, 4)?);
        let padded = Tensor::from_slice(&[3i64, 5, 0, 0]).view([1, 4]);
        let unpadded = Tensor::from_slice(&[3i64, 5]).view([1, 2]);
        assert!(sent_encoder
            .forward_t(&padded, false)?
            .equal(&sent_encoder.forward_t(&unpadded, false)?));
        Ok(())
    }

    #[test]
    fn unmasked_phrase_layer_still_pools_over_real_tokens() -> anyhow::Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let lstm = SequenceEncoderConfig {
            encoder_type: SequenceEncoderType::lstm,
            input_dim: 4,
            hidden_size: Some(3),
            num_layers: Some(1),
            bidirectional: Some(false),
            activation: None,
        };
        let embedder = BasicTextFieldEmbedder::new(vs.root() / "embedder", 20, 4);
        let unmasked = PhraseEncoder::new(
            vs.root() / "unmasked",
            Box::new(embedder.share()),
            0,
            lstm.build(vs.root() / "lstm")?,
            0.0,
            false,
        )?;
        let padded = Tensor::from_slice(&[3i64, 5, 0, 0]).view([1, 4]);

        let encoded = unmasked.forward_t(&padded, false)?;
        let padded_outputs = encoded.encoded.narrow(1, 2, 2).abs().sum(Kind::Float);
        assert!(padded_outputs.double_value(&[]) > 0.0);
        assert!(encoded
            .mask
            .equal(&Tensor::from_slice(&[1f32, 1., 0., 0.]).view([1, 4])));

        let sent_encoder = HeadlessSentEncoder::new(unmasked);
        let unpadded = Tensor::from_slice(&[3i64, 5]).view([1, 2]);
        assert!(sent_encoder
            .forward_t(&padded, false)?
            .allclose(&sent_encoder.forward_t(&unpadded, false)?, 1e-6, 1e-6, false));

        let empty = Tensor::from_slice(&[3i64, 5, 0, 0]).view([2, 2]);
        assert!(matches!(
            sent_encoder.forward_t(&empty, false),
            Err(MtlError::DegenerateMaskError(_))
        ));
        Ok(())
    }

    #[test]
    fn empty_sentence_rejected() -> anyhow::Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let sent_encoder = HeadlessSentEncoder::new(phrase_encoder(&vs, 4)?);
        let empty = Tensor::from_slice(&[3i64, 5, 0, 0]).view([2, 2]);
        assert!(matches!(
            sent_encoder.forward_t(&empty, false),
            Err(MtlError::DegenerateMaskError(_))
        ));
        Ok(())
    }

    #[test]
    fn embedder_and_phrase_layer_widths_checked() {
        let vs = nn::VarStore::new(Device::Cpu);
        let embedder = BasicTextFieldEmbedder::new(vs.root(), 20, 4);
        let result = PhraseEncoder::new(
            vs.root(),
            Box::new(embedder),
            1,
            Box::new(PassThroughEncoder::new(5)),
            0.0,
            true,
        );
        assert!(matches!(
            result,
            Err(MtlError::InvalidConfigurationError(_))
        ));
    }
}
