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

use crate::bidaf::HeadlessBiDAF;
use crate::encoders::{HeadlessPairEncoder, HeadlessSentEncoder, PhraseEncoder};
use crate::modules::{
    BasicTextFieldEmbedder, MaskedPooling, SequenceEncoderConfig, SimilarityFunctionType,
};
use crate::multitask::classifier::{ClassifierHead, ClassifierType};
use crate::multitask::task::{Scorer, Task};
use crate::{Config, MtlError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use tch::{nn, Kind, Tensor};

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// # Pair encoding strategy
pub enum PairEncoderType {
    /// Bidirectional attention flow between the two sequences, max-pooled over the second one
    bidaf,
    /// Independent pooled encodings combined as `[a, b, |a - b|, a * b]`
    simple,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
/// # Multi-task model configuration
/// Defines the shared encoders and the classifier heads of a `MultiTaskModel`
pub struct MultiTaskConfig {
    pub vocab_size: i64,
    pub embedding_dim: i64,
    pub num_highway_layers: i64,
    pub phrase_layer: SequenceEncoderConfig,
    pub modeling_layer: Option<SequenceEncoderConfig>,
    pub similarity_function: Option<SimilarityFunctionType>,
    pub dropout: Option<f64>,
    pub mask_lstms: Option<bool>,
    pub pair_enc_type: PairEncoderType,
    pub classifier_type: ClassifierType,
    pub hidden_dim: Option<i64>,
}

impl Config for MultiTaskConfig {
    /// Loads a `MultiTaskConfig` from a JSON file. An unknown `classifier_type` is reported as
    /// `MtlError::InvalidClassifierKind`, other malformed content as `MtlError::ParsingError`.
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MtlError> {
        let f = File::open(path)?;
        let br = BufReader::new(f);
        let value: serde_json::Value = serde_json::from_reader(br)?;
        if let Some(classifier_type) = value
            .get("classifier_type")
            .and_then(serde_json::Value::as_str)
        {
            ClassifierType::from_str(classifier_type)?;
        }
        let config: Self = serde_json::from_value(value)?;
        Ok(config)
    }
}

impl MultiTaskConfig {
    pub fn dropout(&self) -> f64 {
        self.dropout.unwrap_or(0.2)
    }

    pub fn mask_lstms(&self) -> bool {
        self.mask_lstms.unwrap_or(true)
    }

    pub fn similarity_function(&self) -> SimilarityFunctionType {
        self.similarity_function
            .unwrap_or(SimilarityFunctionType::linear)
    }

    /// Checks value ranges and the dimensions that can be read from the configuration alone.
    pub fn validate(&self) -> Result<(), MtlError> {
        if self.vocab_size < 1 || self.embedding_dim < 1 {
            return Err(MtlError::InvalidConfigurationError(format!(
                "vocab_size and embedding_dim must be positive, got {} and {}",
                self.vocab_size, self.embedding_dim
            )));
        }
        if self.num_highway_layers < 0 {
            return Err(MtlError::InvalidConfigurationError(format!(
                "num_highway_layers must be non-negative, got {}",
                self.num_highway_layers
            )));
        }
        if !(0.0..1.0).contains(&self.dropout()) {
            return Err(MtlError::InvalidConfigurationError(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout()
            )));
        }
        if self.phrase_layer.input_dim != self.embedding_dim {
            return Err(MtlError::InvalidConfigurationError(format!(
                "The phrase layer input dimension ({}) must match the embedding dimension ({})",
                self.phrase_layer.input_dim, self.embedding_dim
            )));
        }
        if self.pair_enc_type == PairEncoderType::bidaf && self.modeling_layer.is_none() {
            return Err(MtlError::InvalidConfigurationError(
                "A modeling_layer is required by the bidaf pair encoder".to_string(),
            ));
        }
        if self.classifier_type != ClassifierType::log_reg
            && !matches!(self.hidden_dim, Some(hidden_dim) if hidden_dim > 0)
        {
            return Err(MtlError::InvalidConfigurationError(format!(
                "A positive hidden_dim is required by the {} classifier, got {:?}",
                self.classifier_type, self.hidden_dim
            )));
        }
        Ok(())
    }
}

/// # Pair encoder used for the pair tasks of a `MultiTaskModel`
pub enum PairEncoder {
    BiDAF(HeadlessBiDAF),
    Simple(HeadlessPairEncoder),
}

impl PairEncoder {
    pub fn pair_encoder_type(&self) -> PairEncoderType {
        match self {
            PairEncoder::BiDAF(_) => PairEncoderType::bidaf,
            PairEncoder::Simple(_) => PairEncoderType::simple,
        }
    }

    /// Width of the pooled pair representation.
    pub fn output_dim(&self) -> i64 {
        match self {
            PairEncoder::BiDAF(bidaf) => bidaf.output_dim(),
            PairEncoder::Simple(simple) => simple.output_dim(),
        }
    }

    /// Encodes a batch of sequence pairs into a (*batch size*, *output_dim*) tensor. The
    /// attention flow representation is max-pooled over the unmasked tokens of `input_2`.
    pub fn forward_t(
        &self,
        input_1: &Tensor,
        input_2: &Tensor,
        train: bool,
    ) -> Result<Tensor, MtlError> {
        match self {
            PairEncoder::BiDAF(bidaf) => {
                let bidaf_output = bidaf.forward_t(input_1, input_2, train)?;
                MaskedPooling::new().forward(
                    &bidaf_output.pair_representation,
                    &bidaf_output.passage_mask,
                )
            }
            PairEncoder::Simple(simple) => simple.forward_t(input_1, input_2, train),
        }
    }
}

/// Container for the multi-task model output.
pub struct MultiTaskOutput {
    /// Logits of shape (*batch size*, *n_classes*)
    pub logits: Tensor,
    /// Scalar loss, only computed when a label is provided
    pub loss: Option<Tensor>,
}

/// # Multi-task classification model
///
/// Routes each task to the shared sentence encoder or to the shared pair encoder, then
/// through a classifier head owned by the task. Heads are registered with
/// [`build_classifier`](MultiTaskModel::build_classifier) before the forward passes.
pub struct MultiTaskModel {
    sent_encoder: HeadlessSentEncoder,
    pair_encoder: PairEncoder,
    pred_layers: HashMap<String, ClassifierHead>,
}

impl MultiTaskModel {
    pub fn new(sent_encoder: HeadlessSentEncoder, pair_encoder: PairEncoder) -> MultiTaskModel {
        MultiTaskModel {
            sent_encoder,
            pair_encoder,
            pred_layers: HashMap::new(),
        }
    }

    /// Build a new `MultiTaskModel` with no classifier registered. The word embeddings are
    /// shared by the sentence and pair encoders, the phrase layers are not.
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the model
    /// * `config` - `MultiTaskConfig` object defining the encoders
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_mtl::multitask::{MultiTaskConfig, MultiTaskModel};
    /// use rust_mtl::Config;
    /// use std::path::Path;
    /// use tch::{nn, Device};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = MultiTaskConfig::from_file(Path::new("path/to/config.json"))?;
    /// let vs = nn::VarStore::new(Device::cuda_if_available());
    /// let model = MultiTaskModel::from_config(vs.root(), &config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config<'p, P>(p: P, config: &MultiTaskConfig) -> Result<MultiTaskModel, MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        config.validate()?;
        let embedder = BasicTextFieldEmbedder::new(
            p / "text_field_embedder",
            config.vocab_size,
            config.embedding_dim,
        );

        let sent_p = p / "sent_encoder";
        let sent_phrase_encoder = PhraseEncoder::new(
            &sent_p,
            Box::new(embedder.share()),
            config.num_highway_layers,
            config.phrase_layer.build(&sent_p / "phrase_layer")?,
            config.dropout(),
            config.mask_lstms(),
        )?;
        let sent_encoder = HeadlessSentEncoder::new(sent_phrase_encoder);

        let pair_p = p / "pair_encoder";
        let pair_phrase_encoder = PhraseEncoder::new(
            &pair_p,
            Box::new(embedder),
            config.num_highway_layers,
            config.phrase_layer.build(&pair_p / "phrase_layer")?,
            config.dropout(),
            config.mask_lstms(),
        )?;
        let pair_encoder = match (config.pair_enc_type, &config.modeling_layer) {
            (PairEncoderType::bidaf, Some(modeling_layer)) => {
                let similarity_function = config.similarity_function().build(
                    &pair_p / "similarity_function",
                    pair_phrase_encoder.output_dim(),
                );
                let modeling_layer =
                    modeling_layer.build(&pair_p / "modeling_layer")?;
                PairEncoder::BiDAF(HeadlessBiDAF::new(
                    pair_phrase_encoder,
                    similarity_function,
                    modeling_layer,
                    config.dropout(),
                    config.mask_lstms(),
                )?)
            }
            (PairEncoderType::bidaf, None) => {
                return Err(MtlError::InvalidConfigurationError(
                    "A modeling_layer is required by the bidaf pair encoder".to_string(),
                ));
            }
            (PairEncoderType::simple, _) => {
                PairEncoder::Simple(HeadlessPairEncoder::new(pair_phrase_encoder))
            }
        };

        log::info!(
            "Built multi-task model: sentence encoder dim {}, {:?} pair encoder dim {}",
            sent_encoder.output_dim(),
            pair_encoder.pair_encoder_type(),
            pair_encoder.output_dim()
        );
        Ok(MultiTaskModel::new(sent_encoder, pair_encoder))
    }

    pub fn pair_encoder_type(&self) -> PairEncoderType {
        self.pair_encoder.pair_encoder_type()
    }

    /// Width of the representation the task is routed to.
    pub fn input_dim_for(&self, task: &Task) -> i64 {
        if task.pair_input {
            self.pair_encoder.output_dim()
        } else {
            self.sent_encoder.output_dim()
        }
    }

    pub fn has_classifier(&self, task_name: &str) -> bool {
        self.pred_layers.contains_key(task_name)
    }

    /// Registers the classifier head of a task, replacing any head previously registered
    /// under the same task name.
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the head
    /// * `task` - task the head predicts for
    /// * `classifier_type` - head architecture
    /// * `input_dim` - must match the width of the representation the task is routed to
    /// * `hidden_dim` - width of the hidden layers, ignored by `log_reg`
    /// * `dropout` - dropout probability of the head
    pub fn build_classifier<'p, P>(
        &mut self,
        p: P,
        task: &Task,
        classifier_type: ClassifierType,
        input_dim: i64,
        hidden_dim: i64,
        dropout: f64,
    ) -> Result<(), MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let expected_dim = self.input_dim_for(task);
        if input_dim != expected_dim {
            return Err(MtlError::InvalidConfigurationError(format!(
                "Classifier input dimension for task {} must be {expected_dim}, got {input_dim}",
                task.name
            )));
        }
        let head = ClassifierHead::new(
            p,
            classifier_type,
            input_dim,
            hidden_dim,
            task.n_classes,
            dropout,
        )?;
        log::debug!(
            "Registered {classifier_type} classifier for task {} ({input_dim} -> {})",
            task.name,
            task.n_classes
        );
        if self.pred_layers.insert(task.name.clone(), head).is_some() {
            log::warn!("Replaced the existing classifier of task {}", task.name);
        }
        Ok(())
    }

    /// Registers the classifier head of a task using the classifier settings of `config`.
    pub fn build_task_classifier<'p, P>(
        &mut self,
        p: P,
        task: &Task,
        config: &MultiTaskConfig,
    ) -> Result<(), MtlError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let input_dim = self.input_dim_for(task);
        self.build_classifier(
            p,
            task,
            config.classifier_type,
            input_dim,
            config.hidden_dim.unwrap_or(0),
            config.dropout(),
        )
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `task` - task to predict for, its classifier must be registered
    /// * `input_1` - token ids of shape (*batch size*, *length 1*), padded with 0
    /// * `input_2` - token ids of the second sequences, required by pair tasks and ignored otherwise
    /// * `label` - optional labels of shape (*batch size*) or (*batch size*, 1)
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `MultiTaskOutput` containing:
    ///   - `logits` - `Tensor` of shape (*batch size*, *n_classes*)
    ///   - `loss` - `Option<Tensor>` scalar loss, `Some` when a label is provided
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use rust_mtl::multitask::{MultiTaskConfig, MultiTaskModel, Task};
    /// # use rust_mtl::Config;
    /// # use tch::{nn, Device, Tensor};
    /// # fn main() -> anyhow::Result<()> {
    /// # let config = MultiTaskConfig::from_file("path/to/config.json")?;
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let mut model = MultiTaskModel::from_config(vs.root() / "model", &config)?;
    /// let mnli = Task::new("mnli", 3, true)?;
    /// model.build_task_classifier(vs.root() / "mnli", &mnli, &config)?;
    ///
    /// let premise = Tensor::from_slice(&[4i64, 12, 7, 0]).view([1, 4]);
    /// let hypothesis = Tensor::from_slice(&[9i64, 3, 0]).view([1, 3]);
    /// let label = Tensor::from_slice(&[2i64]);
    /// let output = model.forward_t(&mnli, &premise, Some(&hypothesis), Some(&label), true)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn forward_t(
        &self,
        task: &Task,
        input_1: &Tensor,
        input_2: Option<&Tensor>,
        label: Option<&Tensor>,
        train: bool,
    ) -> Result<MultiTaskOutput, MtlError> {
        let pred_layer = self
            .pred_layers
            .get(&task.name)
            .ok_or_else(|| MtlError::UnregisteredTaskError(task.name.clone()))?;

        let representation = if task.pair_input {
            let input_2 =
                input_2.ok_or_else(|| MtlError::MissingPairInputError(task.name.clone()))?;
            self.pair_encoder.forward_t(input_1, input_2, train)?
        } else {
            self.sent_encoder.forward_t(input_1, train)?
        };
        let logits = pred_layer.forward_t(&representation, train);

        let loss = match label {
            Some(label) => Some(compute_loss(task, &logits, label)?),
            None => None,
        };
        Ok(MultiTaskOutput { logits, loss })
    }
}

fn compute_loss(task: &Task, logits: &Tensor, label: &Tensor) -> Result<Tensor, MtlError> {
    let label = if label.dim() == 2 && label.size()[1] == 1 {
        label.squeeze_dim(-1)
    } else {
        label.shallow_clone()
    };
    if label.dim() != 1 || label.size()[0] != logits.size()[0] {
        return Err(MtlError::ShapeMismatchError(format!(
            "Expected labels of shape ({},), got {:?}",
            logits.size()[0],
            label.size()
        )));
    }

    let loss = match &task.loss {
        Some(loss_function) => loss_function(logits, &label),
        None => logits.cross_entropy_for_logits(&label.to_kind(Kind::Int64)),
    };

    let mut scorer = task.scorer();
    if matches!(*scorer, Scorer::CategoricalAccuracy { .. }) {
        scorer.update_with_predictions(logits, &label)?;
    } else {
        scorer.update_with_value(loss.double_value(&[]))?;
    }
    Ok(loss)
}
