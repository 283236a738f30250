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

use crate::MtlError;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tch::{Kind, Reduction, Tensor};

/// Custom loss, called with the logits (*batch size*, *n_classes*) and the labels (*batch size*).
pub type LossFunction = Box<dyn Fn(&Tensor, &Tensor) -> Tensor + Send + Sync>;

/// Mean squared error between single-output logits and float labels.
pub fn mse_loss(logits: &Tensor, labels: &Tensor) -> Tensor {
    logits
        .squeeze_dim(-1)
        .mse_loss(&labels.to_kind(logits.kind()), Reduction::Mean)
}

/// # Running metric attached to a task
#[derive(Debug, Clone, PartialEq)]
pub enum Scorer {
    /// Share of predictions (argmax of the logits) equal to the label
    CategoricalAccuracy { correct: f64, total: f64 },
    /// Mean of the observed values
    Average { total: f64, count: f64 },
}

impl Scorer {
    pub fn categorical_accuracy() -> Scorer {
        Scorer::CategoricalAccuracy {
            correct: 0.0,
            total: 0.0,
        }
    }

    pub fn average() -> Scorer {
        Scorer::Average {
            total: 0.0,
            count: 0.0,
        }
    }

    /// Accumulates the predictions of a batch.
    ///
    /// # Arguments
    ///
    /// * `logits` - Tensor of shape (*batch size*, *n_classes*)
    /// * `labels` - Tensor of shape (*batch size*) holding the class indices
    pub fn update_with_predictions(
        &mut self,
        logits: &Tensor,
        labels: &Tensor,
    ) -> Result<(), MtlError> {
        match self {
            Scorer::CategoricalAccuracy { correct, total } => {
                let predictions = logits.argmax(-1, false);
                let batch_correct = predictions
                    .eq_tensor(&labels.to_kind(predictions.kind()))
                    .to_kind(Kind::Double)
                    .sum(Kind::Double)
                    .double_value(&[]);
                *correct += batch_correct;
                *total += labels.size()[0] as f64;
                Ok(())
            }
            Scorer::Average { .. } => Err(MtlError::InvalidConfigurationError(
                "An average scorer accumulates values, not predictions".to_string(),
            )),
        }
    }

    /// Accumulates a single value (e.g. the loss of a batch).
    pub fn update_with_value(&mut self, value: f64) -> Result<(), MtlError> {
        match self {
            Scorer::Average { total, count } => {
                *total += value;
                *count += 1.0;
                Ok(())
            }
            Scorer::CategoricalAccuracy { .. } => Err(MtlError::InvalidConfigurationError(
                "A categorical accuracy scorer accumulates predictions, not values".to_string(),
            )),
        }
    }

    /// Current value of the metric, 0 if nothing was accumulated. Optionally resets the scorer.
    pub fn get_metric(&mut self, reset: bool) -> f64 {
        let metric = match self {
            Scorer::CategoricalAccuracy { correct, total } if *total > 0.0 => *correct / *total,
            Scorer::Average { total, count } if *count > 0.0 => *total / *count,
            _ => 0.0,
        };
        if reset {
            self.reset();
        }
        metric
    }

    pub fn reset(&mut self) {
        match self {
            Scorer::CategoricalAccuracy { correct, total } => {
                *correct = 0.0;
                *total = 0.0;
            }
            Scorer::Average { total, count } => {
                *total = 0.0;
                *count = 0.0;
            }
        }
    }
}

/// # Task descriptor
///
/// Declares how a task is routed and scored:
/// - `pair_input`: the task takes two sequences
/// - `loss`: optional custom loss, cross-entropy is used when absent
/// - a scorer, updated on every labelled forward pass
///
/// The scorer sits behind a mutex so that a task can be shared by reference while being
/// scored.
pub struct Task {
    pub name: String,
    pub n_classes: i64,
    pub pair_input: bool,
    pub loss: Option<LossFunction>,
    scorer: Mutex<Scorer>,
}

impl Task {
    /// Classification task scored with categorical accuracy and trained with cross-entropy.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_mtl::multitask::Task;
    ///
    /// let mnli = Task::new("mnli", 3, true).unwrap();
    /// let sst = Task::new("sst", 2, false).unwrap();
    /// ```
    pub fn new<S: Into<String>>(
        name: S,
        n_classes: i64,
        pair_input: bool,
    ) -> Result<Task, MtlError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MtlError::InvalidConfigurationError(
                "Task name must not be empty".to_string(),
            ));
        }
        if n_classes < 1 {
            return Err(MtlError::InvalidConfigurationError(format!(
                "Task {name} must have at least one class, got {n_classes}"
            )));
        }
        Ok(Task {
            name,
            n_classes,
            pair_input,
            loss: None,
            scorer: Mutex::new(Scorer::categorical_accuracy()),
        })
    }

    /// Regression task with a single output, trained with a mean squared error and scored
    /// with the running average of the loss.
    pub fn regression<S: Into<String>>(name: S, pair_input: bool) -> Result<Task, MtlError> {
        Ok(Task::new(name, 1, pair_input)?
            .with_loss(Box::new(mse_loss))
            .with_scorer(Scorer::average()))
    }

    pub fn with_loss(mut self, loss: LossFunction) -> Task {
        self.loss = Some(loss);
        self
    }

    pub fn with_scorer(self, scorer: Scorer) -> Task {
        Task {
            scorer: Mutex::new(scorer),
            ..self
        }
    }

    pub fn has_custom_loss(&self) -> bool {
        self.loss.is_some()
    }

    pub(crate) fn scorer(&self) -> MutexGuard<'_, Scorer> {
        self.scorer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value of the task metric. Optionally resets the scorer.
    pub fn get_metric(&self, reset: bool) -> f64 {
        self.scorer().get_metric(reset)
    }

    pub fn reset_metric(&self) {
        self.scorer().reset()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("n_classes", &self.n_classes)
            .field("pair_input", &self.pair_input)
            .field("custom_loss", &self.has_custom_loss())
            .field("scorer", &*self.scorer())
            .finish()
    }
}
