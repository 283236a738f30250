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
use crate::MtlError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use tch::nn::{Module, ModuleT};
use tch::{nn, Tensor};

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String")]
/// # Available classifier head architectures
pub enum ClassifierType {
    /// Single affine layer
    log_reg,
    /// One hidden layer with a tanh activation
    mlp,
    /// Two hidden layers with tanh activations
    fancy_mlp,
}

impl FromStr for ClassifierType {
    type Err = MtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log_reg" => Ok(ClassifierType::log_reg),
            "mlp" => Ok(ClassifierType::mlp),
            "fancy_mlp" => Ok(ClassifierType::fancy_mlp),
            _ => Err(MtlError::InvalidClassifierKind(format!(
                "{s}, expected one of log_reg, mlp, fancy_mlp"
            ))),
        }
    }
}

impl TryFrom<String> for ClassifierType {
    type Error = MtlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClassifierType::from_str(&value)
    }
}

impl fmt::Display for ClassifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassifierType::log_reg => "log_reg",
            ClassifierType::mlp => "mlp",
            ClassifierType::fancy_mlp => "fancy_mlp",
        };
        write!(f, "{name}")
    }
}

/// # Task classifier head
///
/// Maps a (*batch size*, *input_dim*) representation to (*batch size*, *n_classes*) logits.
/// The hidden layers of the `Mlp` and `FancyMlp` variants are each preceded by dropout and
/// followed by a tanh activation.
pub enum ClassifierHead {
    LogReg {
        classifier: nn::Linear,
    },
    Mlp {
        dropout: Dropout,
        hidden: nn::Linear,
        classifier: nn::Linear,
    },
    FancyMlp {
        dropout: Dropout,
        hidden_1: nn::Linear,
        hidden_2: nn::Linear,
        classifier: nn::Linear,
    },
}

impl ClassifierHead {
    /// Build a new `ClassifierHead`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the head
    /// * `classifier_type` - head architecture
    /// * `input_dim` - width of the input representation
    /// * `hidden_dim` - width of the hidden layers, ignored by `log_reg`
    /// * `n_classes` - number of output logits
    /// * `dropout` - dropout probability applied before each affine layer of the MLP variants
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_mtl::multitask::{ClassifierHead, ClassifierType};
    /// use tch::{nn, Device, Kind, Tensor};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let head = ClassifierHead::new(vs.root() / "sst", ClassifierType::mlp, 16, 8, 2, 0.2).unwrap();
    /// let logits = head.forward_t(&Tensor::rand([5, 16], (Kind::Float, Device::Cpu)), false);
    /// assert_eq!(logits.size(), vec![5, 2]);
    /// ```
    pub fn new<'p, P>(
        p: P,
        classifier_type: ClassifierType,
        input_dim: i64,
        hidden_dim: i64,
        n_classes: i64,
        dropout: f64,
    ) -> Result<ClassifierHead, MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        if input_dim < 1 || n_classes < 1 {
            return Err(MtlError::InvalidConfigurationError(format!(
                "Classifier dimensions must be positive, got input_dim {input_dim} and n_classes {n_classes}"
            )));
        }
        if classifier_type != ClassifierType::log_reg && hidden_dim < 1 {
            return Err(MtlError::InvalidConfigurationError(format!(
                "{classifier_type} classifier requires a positive hidden_dim, got {hidden_dim}"
            )));
        }
        let dropout = Dropout::new(dropout)?;

        Ok(match classifier_type {
            ClassifierType::log_reg => ClassifierHead::LogReg {
                classifier: nn::linear(p / "classifier", input_dim, n_classes, Default::default()),
            },
            ClassifierType::mlp => ClassifierHead::Mlp {
                dropout,
                hidden: nn::linear(p / "hidden", input_dim, hidden_dim, Default::default()),
                classifier: nn::linear(p / "classifier", hidden_dim, n_classes, Default::default()),
            },
            ClassifierType::fancy_mlp => ClassifierHead::FancyMlp {
                dropout,
                hidden_1: nn::linear(p / "hidden_1", input_dim, hidden_dim, Default::default()),
                hidden_2: nn::linear(p / "hidden_2", hidden_dim, hidden_dim, Default::default()),
                classifier: nn::linear(p / "classifier", hidden_dim, n_classes, Default::default()),
            },
        })
    }

    pub fn classifier_type(&self) -> ClassifierType {
        match self {
            ClassifierHead::LogReg { .. } => ClassifierType::log_reg,
            ClassifierHead::Mlp { .. } => ClassifierType::mlp,
            ClassifierHead::FancyMlp { .. } => ClassifierType::fancy_mlp,
        }
    }

    pub fn input_dim(&self) -> i64 {
        let first_layer = match self {
            ClassifierHead::LogReg { classifier } => classifier,
            ClassifierHead::Mlp { hidden, .. } => hidden,
            ClassifierHead::FancyMlp { hidden_1, .. } => hidden_1,
        };
        first_layer.ws.size()[1]
    }

    pub fn n_classes(&self) -> i64 {
        let classifier = match self {
            ClassifierHead::LogReg { classifier }
            | ClassifierHead::Mlp { classifier, .. }
            | ClassifierHead::FancyMlp { classifier, .. } => classifier,
        };
        classifier.ws.size()[0]
    }

    /// Forward pass through the head
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape (*batch size*, *input_dim*)
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *n_classes*)
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        match self {
            ClassifierHead::LogReg { classifier } => input.apply(classifier),
            ClassifierHead::Mlp {
                dropout,
                hidden,
                classifier,
            } => {
                let hidden_state = dropout.forward_t(input, train).apply(hidden).tanh();
                dropout.forward_t(&hidden_state, train).apply(classifier)
            }
            ClassifierHead::FancyMlp {
                dropout,
                hidden_1,
                hidden_2,
                classifier,
            } => {
                let hidden_state = dropout.forward_t(input, train).apply(hidden_1).tanh();
                let hidden_state = dropout
                    .forward_t(&hidden_state, train)
                    .apply(hidden_2)
                    .tanh();
                classifier.forward(&dropout.forward_t(&hidden_state, train))
            }
        }
    }
}
