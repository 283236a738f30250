//! # Multi-task sentence and sentence-pair classification
//!
//! Encoders and task routing for training one model on several classification tasks, built
//! on [tch-rs](https://github.com/LaurentMazare/tch-rs):
//! - `modules`: token embedder, highway layers, sequence encoders, similarity functions and
//!   masked max-pooling
//! - `bidaf`: bidirectional attention flow between a question and a passage
//! - `encoders`: headless sentence and pair encoders
//! - `multitask`: task descriptors, classifier heads and the `MultiTaskModel` router
//!
//! Token ids are padded with 0. Masks are float tensors with 1 for real tokens and 0 for
//! padding, and every row of a mask must contain at least one real token.
//!
//! ```no_run
//! use rust_mtl::multitask::{ClassifierType, MultiTaskModel, PairEncoder, Task};
//! use rust_mtl::bidaf::HeadlessBiDAF;
//! use rust_mtl::encoders::{HeadlessSentEncoder, PhraseEncoder};
//! use rust_mtl::modules::{BasicTextFieldEmbedder, LinearSimilarity, PassThroughEncoder};
//! use tch::{nn, Device, Tensor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let vs = nn::VarStore::new(Device::Cpu);
//! let embedder = BasicTextFieldEmbedder::new(vs.root() / "embedder", 100, 4);
//! let phrase_encoder = |name: &str, embedder: &BasicTextFieldEmbedder| {
//!     PhraseEncoder::new(
//!         vs.root() / name,
//!         Box::new(embedder.share()),
//!         1,
//!         Box::new(PassThroughEncoder::new(4)),
//!         0.2,
//!         true,
//!     )
//! };
//! let sent_encoder = HeadlessSentEncoder::new(phrase_encoder("sent", &embedder)?);
//! let bidaf = HeadlessBiDAF::new(
//!     phrase_encoder("pair", &embedder)?,
//!     Box::new(LinearSimilarity::new(vs.root() / "similarity", 4)),
//!     Box::new(PassThroughEncoder::new(16)),
//!     0.2,
//!     true,
//! )?;
//! let mut model = MultiTaskModel::new(sent_encoder, PairEncoder::BiDAF(bidaf));
//!
//! let rte = Task::new("rte", 2, true)?;
//! let input_dim = model.input_dim_for(&rte);
//! model.build_classifier(vs.root() / "rte", &rte, ClassifierType::log_reg, input_dim, 0, 0.0)?;
//!
//! let premise = Tensor::from_slice(&[4i64, 12, 7]).view([1, 3]);
//! let hypothesis = Tensor::from_slice(&[9i64, 3]).view([1, 2]);
//! let output = model.forward_t(&rte, &premise, Some(&hypothesis), None, false)?;
//! assert_eq!(output.logits.size(), vec![1, 2]);
//! # Ok(())
//! # }
//! ```

pub mod bidaf;
pub mod common;
pub mod encoders;
pub mod modules;
pub mod multitask;

pub use common::error::MtlError;
pub use common::{Activation, Config};
