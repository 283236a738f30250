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

use crate::common::activations::Activation;
use crate::MtlError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::nn::RNN;
use tch::{nn, Tensor};

/// # Sequence to sequence encoder
///
/// Maps a padded (*batch size*, *sequence length*, *input_dim*) sequence to a
/// (*batch size*, *sequence length*, *output_dim*) sequence. The mask is optional: when it is
/// `None` the encoder applies no masking.
pub trait SequenceEncoder: Send {
    fn input_dim(&self) -> i64;

    fn output_dim(&self) -> i64;

    fn forward_t(&self, inputs: &Tensor, mask: Option<&Tensor>, train: bool) -> Tensor;
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// # Available sequence encoder architectures
pub enum SequenceEncoderType {
    lstm,
    gru,
    feedforward,
    pass_through,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// # Sequence encoder configuration
pub struct SequenceEncoderConfig {
    #[serde(rename = "type")]
    pub encoder_type: SequenceEncoderType,
    pub input_dim: i64,
    pub hidden_size: Option<i64>,
    pub num_layers: Option<i64>,
    pub bidirectional: Option<bool>,
    pub activation: Option<Activation>,
}

impl SequenceEncoderConfig {
    /// Builds the encoder described by the configuration.
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the encoder
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_mtl::modules::{SequenceEncoderConfig, SequenceEncoderType};
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let config = SequenceEncoderConfig {
    ///     encoder_type: SequenceEncoderType::lstm,
    ///     input_dim: 300,
    ///     hidden_size: Some(100),
    ///     num_layers: Some(1),
    ///     bidirectional: Some(true),
    ///     activation: None,
    /// };
    /// let phrase_layer = config.build(vs.root() / "phrase_layer").unwrap();
    /// assert_eq!(phrase_layer.output_dim(), 200);
    /// ```
    pub fn build<'p, P>(&self, p: P) -> Result<Box<dyn SequenceEncoder>, MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        Ok(match self.encoder_type {
            SequenceEncoderType::lstm | SequenceEncoderType::gru => {
                Box::new(RecurrentEncoder::new(p, self)?)
            }
            SequenceEncoderType::feedforward => {
                let output_dim = self.required_hidden_size()?;
                Box::new(FeedForwardEncoder::new(
                    p,
                    self.input_dim,
                    output_dim,
                    self.activation.unwrap_or(Activation::relu),
                ))
            }
            SequenceEncoderType::pass_through => Box::new(PassThroughEncoder::new(self.input_dim)),
        })
    }

    fn required_hidden_size(&self) -> Result<i64, MtlError> {
        match self.hidden_size {
            Some(hidden_size) if hidden_size > 0 => Ok(hidden_size),
            _ => Err(MtlError::InvalidConfigurationError(format!(
                "A positive hidden_size is required for a {:?} encoder",
                self.encoder_type
            ))),
        }
    }
}

enum RecurrentLayer {
    Lstm(nn::LSTM),
    Gru(nn::GRU),
}

/// # Recurrent (LSTM or GRU) encoder
///
/// With a mask, padded inputs are zeroed before the recurrent pass and padded outputs are
/// zeroed after it.
pub struct RecurrentEncoder {
    layer: RecurrentLayer,
    input_dim: i64,
    output_dim: i64,
}

impl RecurrentEncoder {
    pub fn new<'p, P>(p: P, config: &SequenceEncoderConfig) -> Result<RecurrentEncoder, MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let hidden_size = config.required_hidden_size()?;
        let bidirectional = config.bidirectional.unwrap_or(false);
        let rnn_config = nn::RNNConfig {
            num_layers: config.num_layers.unwrap_or(1),
            bidirectional,
            batch_first: true,
            ..Default::default()
        };
        let layer = match config.encoder_type {
            SequenceEncoderType::lstm => {
                RecurrentLayer::Lstm(nn::lstm(p, config.input_dim, hidden_size, rnn_config))
            }
            SequenceEncoderType::gru => {
                RecurrentLayer::Gru(nn::gru(p, config.input_dim, hidden_size, rnn_config))
            }
            other => {
                return Err(MtlError::InvalidConfigurationError(format!(
                    "{other:?} is not a recurrent encoder type"
                )));
            }
        };
        let output_dim = if bidirectional {
            2 * hidden_size
        } else {
            hidden_size
        };

        Ok(RecurrentEncoder {
            layer,
            input_dim: config.input_dim,
            output_dim,
        })
    }
}

impl SequenceEncoder for RecurrentEncoder {
    fn input_dim(&self) -> i64 {
        self.input_dim
    }

    fn output_dim(&self) -> i64 {
        self.output_dim
    }

    fn forward_t(&self, inputs: &Tensor, mask: Option<&Tensor>, _train: bool) -> Tensor {
        let mask = mask.map(|mask| mask.to_kind(inputs.kind()).unsqueeze(-1));
        let inputs = match &mask {
            Some(mask) => inputs * mask,
            None => inputs.shallow_clone(),
        };
        let outputs = match &self.layer {
            RecurrentLayer::Lstm(lstm) => lstm.seq(&inputs).0,
            RecurrentLayer::Gru(gru) => gru.seq(&inputs).0,
        };
        match &mask {
            Some(mask) => outputs * mask,
            None => outputs,
        }
    }
}

/// # Time-distributed affine layer followed by an activation
pub struct FeedForwardEncoder {
    linear: nn::Linear,
    activation: Activation,
    input_dim: i64,
    output_dim: i64,
}

impl FeedForwardEncoder {
    pub fn new<'p, P>(p: P, input_dim: i64, output_dim: i64, activation: Activation) -> Self
    where
        P: Borrow<nn::Path<'p>>,
    {
        let linear = nn::linear(p.borrow() / "linear", input_dim, output_dim, Default::default());
        FeedForwardEncoder {
            linear,
            activation,
            input_dim,
            output_dim,
        }
    }
}

impl SequenceEncoder for FeedForwardEncoder {
    fn input_dim(&self) -> i64 {
        self.input_dim
    }

    fn output_dim(&self) -> i64 {
        self.output_dim
    }

    fn forward_t(&self, inputs: &Tensor, mask: Option<&Tensor>, _train: bool) -> Tensor {
        let outputs = self.activation.get_function()(&inputs.apply(&self.linear));
        match mask {
            Some(mask) => outputs * mask.to_kind(inputs.kind()).unsqueeze(-1),
            None => outputs,
        }
    }
}

/// # Identity encoder
#[derive(Debug, Clone, Copy)]
pub struct PassThroughEncoder {
    dim: i64,
}

impl PassThroughEncoder {
    pub fn new(dim: i64) -> PassThroughEncoder {
        PassThroughEncoder { dim }
    }
}

impl SequenceEncoder for PassThroughEncoder {
    fn input_dim(&self) -> i64 {
        self.dim
    }

    fn output_dim(&self) -> i64 {
        self.dim
    }

    fn forward_t(&self, inputs: &Tensor, _mask: Option<&Tensor>, _train: bool) -> Tensor {
        inputs.shallow_clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tch::{Device, Kind};

    fn config(encoder_type: SequenceEncoderType, bidirectional: bool) -> SequenceEncoderConfig {
        SequenceEncoderConfig {
            encoder_type,
            input_dim: 6,
            hidden_size: Some(3),
            num_layers: Some(1),
            bidirectional: Some(bidirectional),
            activation: None,
        }
    }

    #[test]
    fn encoders_declare_dimensions() -> anyhow::Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let inputs = Tensor::randn([2, 5, 6], (Kind::Float, Device::Cpu));
        let cases = [
            (SequenceEncoderType::lstm, true, 6),
            (SequenceEncoderType::lstm, false, 3),
            (SequenceEncoderType::gru, true, 6),
            (SequenceEncoderType::feedforward, false, 3),
            (SequenceEncoderType::pass_through, false, 6),
        ];
        for (index, (encoder_type, bidirectional, expected_dim)) in cases.iter().enumerate() {
            let encoder = config(*encoder_type, *bidirectional).build(vs.root() / index)?;
            assert_eq!(encoder.input_dim(), 6);
            assert_eq!(encoder.output_dim(), *expected_dim);
            let outputs = encoder.forward_t(&inputs, None, false);
            assert_eq!(outputs.size(), vec![2, 5, *expected_dim]);
        }
        Ok(())
    }

    #[test]
    fn recurrent_encoder_zeroes_padded_outputs() -> anyhow::Result<()> {
        let vs = nn::VarStore::new(Device::Cpu);
        let encoder = config(SequenceEncoderType::lstm, true).build(vs.root())?;
        let inputs = Tensor::randn([1, 4, 6], (Kind::Float, Device::Cpu));
        let mask = Tensor::from_slice(&[1f32, 1., 1., 0.]).view([1, 4]);
        let outputs = encoder.forward_t(&inputs, Some(&mask), false);
        let padded_total = outputs.select(1, 3).abs().sum(Kind::Float).double_value(&[]);
        assert_eq!(padded_total, 0.0);
        Ok(())
    }

    #[test]
    fn missing_hidden_size_rejected() {
        let vs = nn::VarStore::new(Device::Cpu);
        let mut lstm_config = config(SequenceEncoderType::lstm, false);
        lstm_config.hidden_size = None;
        assert!(matches!(
            lstm_config.build(vs.root()),
            Err(MtlError::InvalidConfigurationError(_))
        ));
    }
}
