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

use crate::common::masking::PADDING_INDEX;
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # Token embedder
///
/// Maps (*batch size*, *sequence length*) token ids to (*batch size*, *sequence length*,
/// *output_dim*) embeddings.
pub trait TextFieldEmbedder: Send {
    fn output_dim(&self) -> i64;

    fn forward(&self, token_ids: &Tensor) -> Tensor;
}

/// # Word embedding lookup table
///
/// Embedders created with [`share`](BasicTextFieldEmbedder::share) use the same weights, so
/// that several encoders can be trained on top of a single table.
pub struct BasicTextFieldEmbedder {
    word_embeddings: Tensor,
    embedding_dim: i64,
}

impl BasicTextFieldEmbedder {
    /// Build a new `BasicTextFieldEmbedder`. The padding index row receives no gradient.
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the embeddings
    /// * `vocab_size` - number of rows of the lookup table
    /// * `embedding_dim` - width of each embedding
    pub fn new<'p, P>(p: P, vocab_size: i64, embedding_dim: i64) -> BasicTextFieldEmbedder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let word_embeddings = (p.borrow() / "word_embeddings").var(
            "weight",
            &[vocab_size, embedding_dim],
            nn::Init::Randn {
                mean: 0.,
                stdev: 1.,
            },
        );
        BasicTextFieldEmbedder {
            word_embeddings,
            embedding_dim,
        }
    }

    /// Returns an embedder backed by the same weights.
    pub fn share(&self) -> BasicTextFieldEmbedder {
        BasicTextFieldEmbedder {
            word_embeddings: self.word_embeddings.shallow_clone(),
            embedding_dim: self.embedding_dim,
        }
    }

    pub fn vocab_size(&self) -> i64 {
        self.word_embeddings.size()[0]
    }
}

impl TextFieldEmbedder for BasicTextFieldEmbedder {
    fn output_dim(&self) -> i64 {
        self.embedding_dim
    }

    fn forward(&self, token_ids: &Tensor) -> Tensor {
        Tensor::embedding(&self.word_embeddings, token_ids, PADDING_INDEX, false, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tch::Device;

    #[test]
    fn shared_embedders_use_the_same_weights() {
        let vs = nn::VarStore::new(Device::Cpu);
        let embedder = BasicTextFieldEmbedder::new(vs.root(), 10, 3);
        let shared = embedder.share();
        let token_ids = Tensor::from_slice(&[1i64, 4, 0]).view([1, 3]);

        assert_eq!(embedder.vocab_size(), 10);
        assert_eq!(vs.variables().len(), 1);
        assert_eq!(embedder.forward(&token_ids).size(), vec![1, 3, 3]);
        assert!(embedder
            .forward(&token_ids)
            .equal(&shared.forward(&token_ids)));
    }
}
