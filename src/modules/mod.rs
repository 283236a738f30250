//! # Building blocks shared by the encoders
//!
//! - `TextFieldEmbedder`: token ids to embeddings
//! - `Highway`: gated time-distributed transform applied to the embeddings
//! - `SequenceEncoder`: sequence to sequence encoders (LSTM, GRU, feed-forward, identity)
//! - `SimilarityFunction`: vector similarity used by the attention flow
//! - `MaskedPooling`: masked max-pooling over time

mod embedder;
mod highway;
mod pooling;
mod seq2seq;
mod similarity;

pub use embedder::{BasicTextFieldEmbedder, TextFieldEmbedder};
pub use highway::Highway;
pub use pooling::MaskedPooling;
pub use seq2seq::{
    FeedForwardEncoder, PassThroughEncoder, RecurrentEncoder, SequenceEncoder,
    SequenceEncoderConfig, SequenceEncoderType,
};
pub use similarity::{
    BilinearSimilarity, CosineSimilarity, DotProductSimilarity, LinearSimilarity,
    SimilarityFunction, SimilarityFunctionType,
};
