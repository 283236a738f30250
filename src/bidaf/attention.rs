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
use crate::common::masking::{check_mask, masked_softmax, replace_masked_values, weighted_sum};
use crate::modules::{SequenceEncoder, SimilarityFunction};
use crate::MtlError;
use tch::nn::ModuleT;
use tch::Tensor;

/// Value written over the similarities of padded question positions before the max over the
/// question axis.
const MASKED_SIMILARITY: f64 = -1e7;

/// # Similarity matrix between every pair of rows of two sequences
pub struct MatrixAttention {
    similarity_function: Box<dyn SimilarityFunction>,
}

impl MatrixAttention {
    pub fn new(similarity_function: Box<dyn SimilarityFunction>) -> MatrixAttention {
        MatrixAttention {
            similarity_function,
        }
    }

    /// Computes `S[b, i, j] = sim(matrix_1[b, i], matrix_2[b, j])`.
    ///
    /// # Arguments
    ///
    /// * `matrix_1` - Tensor of shape (*batch size*, *length_1*, *dim*)
    /// * `matrix_2` - Tensor of shape (*batch size*, *length_2*, *dim*)
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *length_1*, *length_2*)
    pub fn forward(&self, matrix_1: &Tensor, matrix_2: &Tensor) -> Result<Tensor, MtlError> {
        let (batch_size, length_1, dim) = matrix_1.size3()?;
        let (batch_size_2, length_2, dim_2) = matrix_2.size3()?;
        if batch_size != batch_size_2 || dim != dim_2 {
            return Err(MtlError::ShapeMismatchError(format!(
                "Cannot compare sequences of shapes {:?} and {:?}",
                matrix_1.size(),
                matrix_2.size()
            )));
        }
        let tiled_shape = [batch_size, length_1, length_2, dim];
        let tiled_matrix_1 = matrix_1.unsqueeze(2).expand(tiled_shape, false);
        let tiled_matrix_2 = matrix_2.unsqueeze(1).expand(tiled_shape, false);
        Ok(self
            .similarity_function
            .forward(&tiled_matrix_1, &tiled_matrix_2))
    }
}

/// Container for the intermediate tensors of the bidirectional attention.
pub struct BiAttentionOutput {
    /// Passage/question similarity matrix of shape (*batch size*, *passage length*, *question length*)
    pub similarity: Tensor,
    /// Attention of each passage token over the question, (*batch size*, *passage length*, *question length*)
    pub passage_question_attention: Tensor,
    /// Attention of the question over the passage tokens, (*batch size*, *passage length*)
    pub question_passage_attention: Tensor,
    /// Attended question vector for each passage token, (*batch size*, *passage length*, *encoding dim*)
    pub passage_question_vectors: Tensor,
    /// Merged passage `[p, q, p * q, p * p_att]`, (*batch size*, *passage length*, 4 x *encoding dim*)
    pub merged_passage: Tensor,
}

/// # Passage-to-question and question-to-passage attention
///
/// Merges an encoded question into the encoded passage, producing for every passage token
/// `[p, q, p * q, p * p_att]` where `q` is the question attended by this token and `p_att`
/// is the single passage vector attended by the question.
pub struct BidirectionalAttention {
    matrix_attention: MatrixAttention,
}

impl BidirectionalAttention {
    pub fn new(similarity_function: Box<dyn SimilarityFunction>) -> BidirectionalAttention {
        BidirectionalAttention {
            matrix_attention: MatrixAttention::new(similarity_function),
        }
    }

    /// Forward pass through the bidirectional attention
    ///
    /// # Arguments
    ///
    /// * `encoded_question` - Tensor of shape (*batch size*, *question length*, *encoding dim*)
    /// * `encoded_passage` - Tensor of shape (*batch size*, *passage length*, *encoding dim*)
    /// * `question_mask` - Tensor of shape (*batch size*, *question length*)
    /// * `passage_mask` - Tensor of shape (*batch size*, *passage length*)
    ///
    /// # Returns
    ///
    /// * `BiAttentionOutput` containing the similarity matrix, both attention distributions
    ///   and the merged passage
    pub fn forward(
        &self,
        encoded_question: &Tensor,
        encoded_passage: &Tensor,
        question_mask: &Tensor,
        passage_mask: &Tensor,
    ) -> Result<BiAttentionOutput, MtlError> {
        check_mask(encoded_question, question_mask)?;
        check_mask(encoded_passage, passage_mask)?;
        let (batch_size, passage_length, encoding_dim) = encoded_passage.size3()?;

        let similarity = self
            .matrix_attention
            .forward(encoded_passage, encoded_question)?;
        let passage_question_attention = masked_softmax(&similarity, question_mask)?;
        let passage_question_vectors = weighted_sum(encoded_question, &passage_question_attention);

        let masked_similarity = replace_masked_values(&similarity, question_mask, MASKED_SIMILARITY);
        let question_passage_similarity = masked_similarity.max_dim(-1, false).0;
        let question_passage_attention =
            masked_softmax(&question_passage_similarity, passage_mask)?;
        let question_passage_vector = weighted_sum(encoded_passage, &question_passage_attention);
        let tiled_question_passage_vector = question_passage_vector.unsqueeze(1).expand(
            [batch_size, passage_length, encoding_dim],
            false,
        );

        let merged_passage = Tensor::cat(
            &[
                encoded_passage,
                &passage_question_vectors,
                &(encoded_passage * &passage_question_vectors),
                &(encoded_passage * tiled_question_passage_vector),
            ],
            -1,
        );

        Ok(BiAttentionOutput {
            similarity,
            passage_question_attention,
            question_passage_attention,
            passage_question_vectors,
            merged_passage,
        })
    }
}

/// Container for the attention flow output.
pub struct BidirectionalAttentionFlowOutput {
    /// Pair representation `[merged passage, modeled passage]`, (*batch size*, *passage length*, 4 x *encoding dim* + *modeling dim*)
    pub pair_representation: Tensor,
    /// Output of the modeling layer, (*batch size*, *passage length*, *modeling dim*)
    pub modeled_passage: Tensor,
    /// Intermediate attention tensors
    pub attention: BiAttentionOutput,
}

/// # Bidirectional Attention Flow ([Seo et al., 2017](https://arxiv.org/abs/1611.01603))
///
/// Bidirectional attention between an encoded question and an encoded passage, followed by a
/// modeling encoder over the merged passage. The result is a per-passage-token representation
/// of the pair.
pub struct BidirectionalAttentionFlow {
    attention: BidirectionalAttention,
    modeling_layer: Box<dyn SequenceEncoder>,
    dropout: Dropout,
    mask_lstms: bool,
    encoding_dim: i64,
}

impl BidirectionalAttentionFlow {
    /// Build a new `BidirectionalAttentionFlow`
    ///
    /// # Arguments
    ///
    /// * `similarity_function` - similarity used to compare passage and question tokens
    /// * `modeling_layer` - encoder applied to the merged passage, its input dimension must be 4 x `encoding_dim`
    /// * `encoding_dim` - width of the encoded question and passage
    /// * `dropout` - dropout probability applied after the modeling layer and to the pair representation
    /// * `mask_lstms` - pass the passage mask to the modeling layer
    pub fn new(
        similarity_function: Box<dyn SimilarityFunction>,
        modeling_layer: Box<dyn SequenceEncoder>,
        encoding_dim: i64,
        dropout: f64,
        mask_lstms: bool,
    ) -> Result<BidirectionalAttentionFlow, MtlError> {
        if modeling_layer.input_dim() != 4 * encoding_dim {
            return Err(MtlError::InvalidConfigurationError(format!(
                "The input dimension to the modeling_layer must be equal to 4 times the encoding dimension of the phrase_layer. Found {} and 4 * {} respectively.",
                modeling_layer.input_dim(),
                encoding_dim
            )));
        }
        Ok(BidirectionalAttentionFlow {
            attention: BidirectionalAttention::new(similarity_function),
            modeling_layer,
            dropout: Dropout::new(dropout)?,
            mask_lstms,
            encoding_dim,
        })
    }

    pub fn encoding_dim(&self) -> i64 {
        self.encoding_dim
    }

    pub fn modeling_dim(&self) -> i64 {
        self.modeling_layer.output_dim()
    }

    /// Width of the pair representation for each passage token.
    pub fn output_dim(&self) -> i64 {
        4 * self.encoding_dim + self.modeling_dim()
    }

    /// Forward pass through the attention flow
    ///
    /// # Arguments
    ///
    /// * `encoded_question` - Tensor of shape (*batch size*, *question length*, *encoding dim*)
    /// * `encoded_passage` - Tensor of shape (*batch size*, *passage length*, *encoding dim*)
    /// * `question_mask` - Tensor of shape (*batch size*, *question length*)
    /// * `passage_mask` - Tensor of shape (*batch size*, *passage length*)
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `BidirectionalAttentionFlowOutput` containing:
    ///   - `pair_representation` - `Tensor` of shape (*batch size*, *passage length*, 4 x *encoding dim* + *modeling dim*)
    ///   - `modeled_passage` - `Tensor` of shape (*batch size*, *passage length*, *modeling dim*)
    ///   - `attention` - `BiAttentionOutput` with the intermediate attention tensors
    pub fn forward_t(
        &self,
        encoded_question: &Tensor,
        encoded_passage: &Tensor,
        question_mask: &Tensor,
        passage_mask: &Tensor,
        train: bool,
    ) -> Result<BidirectionalAttentionFlowOutput, MtlError> {
        let encoding_dim = *encoded_passage.size().last().unwrap_or(&0);
        if encoding_dim != self.encoding_dim {
            return Err(MtlError::ShapeMismatchError(format!(
                "Expected encodings of width {}, got {}",
                self.encoding_dim, encoding_dim
            )));
        }
        let attention =
            self.attention
                .forward(encoded_question, encoded_passage, question_mask, passage_mask)?;

        let modeling_mask = if self.mask_lstms {
            Some(passage_mask)
        } else {
            None
        };
        let modeled_passage = self.dropout.forward_t(
            &self
                .modeling_layer
                .forward_t(&attention.merged_passage, modeling_mask, train),
            train,
        );
        let pair_representation = self.dropout.forward_t(
            &Tensor::cat(&[&attention.merged_passage, &modeled_passage], -1),
            train,
        );

        Ok(BidirectionalAttentionFlowOutput {
            pair_representation,
            modeled_passage,
            attention,
        })
    }
}
