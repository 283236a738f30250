//! # Bidirectional Attention Flow ([Seo et al., 2017](https://arxiv.org/abs/1611.01603))
//!
//! Attention-based pair encoder. The passage attends to the question and the question
//! attends to the passage; both are merged into an augmented passage encoding that a
//! modeling layer encodes again.
//!
//! - `BidirectionalAttention`: similarity matrix, masked attention in both directions, merge
//! - `BidirectionalAttentionFlow`: attention followed by the modeling layer
//! - `HeadlessBiDAF`: token ids to pair representation

mod attention;
mod bidaf_model;

pub use attention::{
    BiAttentionOutput, BidirectionalAttention, BidirectionalAttentionFlow,
    BidirectionalAttentionFlowOutput, MatrixAttention,
};
pub use bidaf_model::{HeadlessBiDAF, HeadlessBiDAFOutput};
