//! # Multi-task classification
//!
//! A `MultiTaskModel` shares a sentence encoder and a pair encoder across tasks and owns one
//! classifier head per task:
//! - sentence tasks: masked max-pooled phrase encodings
//! - pair tasks: either the pooled bidirectional attention flow representation or the
//!   `[a, b, |a - b|, a * b]` combination of two pooled encodings
//!
//! Each `Task` declares whether it takes a pair of inputs, its optional custom loss (the
//! cross-entropy of the logits is used otherwise) and the scorer updated on labelled batches.
//!
//! ```no_run
//! use rust_mtl::multitask::{MultiTaskConfig, MultiTaskModel, Task};
//! use rust_mtl::Config;
//! use tch::{nn, Device, Tensor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = MultiTaskConfig::from_file("path/to/config.json")?;
//! let vs = nn::VarStore::new(Device::cuda_if_available());
//! let mut model = MultiTaskModel::from_config(vs.root() / "model", &config)?;
//!
//! let sst = Task::new("sst", 2, false)?;
//! let sts_b = Task::regression("sts-b", true)?;
//! model.build_task_classifier(vs.root() / "sst", &sst, &config)?;
//! model.build_task_classifier(vs.root() / "sts-b", &sts_b, &config)?;
//!
//! let sentence = Tensor::from_slice(&[5i64, 18, 3, 0]).view([1, 4]);
//! let output = model.forward_t(&sst, &sentence, None, Some(&Tensor::from_slice(&[1i64])), true)?;
//! println!("accuracy: {}", sst.get_metric(false));
//! # Ok(())
//! # }
//! ```

mod classifier;
mod multitask_model;
mod task;

pub use classifier::{ClassifierHead, ClassifierType};
pub use multitask_model::{
    MultiTaskConfig, MultiTaskModel, MultiTaskOutput, PairEncoder, PairEncoderType,
};
pub use task::{mse_loss, LossFunction, Scorer, Task};
