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

use crate::bidaf::attention::BidirectionalAttentionFlow;
use crate::encoders::PhraseEncoder;
use crate::modules::{SequenceEncoder, SimilarityFunction};
use crate::MtlError;
use tch::Tensor;

/// Container for the headless BiDAF output.
pub struct HeadlessBiDAFOutput {
    /// Pair representation of shape (*batch size*, *passage length*, 4 x *encoding dim* + *modeling dim*)
    pub pair_representation: Tensor,
    /// Float mask of the passage, shape (*batch size*, *passage length*)
    pub passage_mask: Tensor,
}

/// # Headless Bidirectional Attention Flow
///
/// BiDAF pair encoder stopping before the span prediction layers: question and passage are
/// encoded by a shared [`PhraseEncoder`](crate::encoders::PhraseEncoder), merged by the
/// bidirectional attention and encoded again by the modeling layer. The output is a
/// per-passage-token representation that still has to be pooled before classification.
pub struct HeadlessBiDAF {
    phrase_encoder: PhraseEncoder,
    attention_flow: BidirectionalAttentionFlow,
}

impl HeadlessBiDAF {
    /// Build a new `HeadlessBiDAF`
    ///
    /// # Arguments
    ///
    /// * `phrase_encoder` - encoder shared by the question and the passage
    /// * `similarity_function` - similarity used to compare passage and question tokens
    /// * `modeling_layer` - encoder over the merged passage, input dimension 4 x phrase encoder output
    /// * `dropout` - dropout probability applied after the modeling layer
    /// * `mask_lstms` - pass the passage mask to the modeling layer
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_mtl::bidaf::HeadlessBiDAF;
    /// use rust_mtl::encoders::PhraseEncoder;
    /// use rust_mtl::modules::{BasicTextFieldEmbedder, DotProductSimilarity, PassThroughEncoder};
    /// use tch::{nn, Device};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let embedder = BasicTextFieldEmbedder::new(vs.root() / "embedder", 1000, 50);
    /// let phrase_encoder = PhraseEncoder::new(
    ///     vs.root() / "phrase",
    ///     Box::new(embedder),
    ///     1,
    ///     Box::new(PassThroughEncoder::new(50)),
    ///     0.2,
    ///     true,
    /// )?;
    /// let bidaf = HeadlessBiDAF::new(
    ///     phrase_encoder,
    ///     Box::new(DotProductSimilarity::new(false)),
    ///     Box::new(PassThroughEncoder::new(200)),
    ///     0.2,
    ///     true,
    /// )?;
    /// assert_eq!(bidaf.output_dim(), 400);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        phrase_encoder: PhraseEncoder,
        similarity_function: Box<dyn SimilarityFunction>,
        modeling_layer: Box<dyn SequenceEncoder>,
        dropout: f64,
        mask_lstms: bool,
    ) -> Result<HeadlessBiDAF, MtlError> {
        let attention_flow = BidirectionalAttentionFlow::new(
            similarity_function,
            modeling_layer,
            phrase_encoder.output_dim(),
            dropout,
            mask_lstms,
        )?;
        Ok(HeadlessBiDAF {
            phrase_encoder,
            attention_flow,
        })
    }

    /// Width of the pair representation for each passage token.
    pub fn output_dim(&self) -> i64 {
        self.attention_flow.output_dim()
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `question` - token ids of shape (*batch size*, *question length*), padded with 0
    /// * `passage` - token ids of shape (*batch size*, *passage length*), padded with 0
    /// * `train` - boolean flag to turn on/off the dropout layers
    ///
    /// # Returns
    ///
    /// * `HeadlessBiDAFOutput` containing:
    ///   - `pair_representation` - `Tensor` of shape (*batch size*, *passage length*, 4 x *encoding dim* + *modeling dim*)
    ///   - `passage_mask` - `Tensor` of shape (*batch size*, *passage length*)
    pub fn forward_t(
        &self,
        question: &Tensor,
        passage: &Tensor,
        train: bool,
    ) -> Result<HeadlessBiDAFOutput, MtlError> {
        let encoded_question = self.phrase_encoder.forward_t(question, train)?;
        let encoded_passage = self.phrase_encoder.forward_t(passage, train)?;
        let attention_flow_output = self.attention_flow.forward_t(
            &encoded_question.encoded,
            &encoded_passage.encoded,
            &encoded_question.mask,
            &encoded_passage.mask,
            train,
        )?;
        Ok(HeadlessBiDAFOutput {
            pair_representation: attention_flow_output.pair_representation,
            passage_mask: encoded_passage.mask,
        })
    }
}
