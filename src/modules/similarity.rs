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

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::nn::init::DEFAULT_KAIMING_UNIFORM;
use tch::{nn, Tensor};

/// # Similarity between two batches of vectors
///
/// Both inputs share the same leading dimensions, the similarity is computed over the last
/// dimension and the output drops it: (*..., dim*) x (*..., dim*) -> (*...*).
pub trait SimilarityFunction: Send {
    fn forward(&self, tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor;
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// # Similarity function used to build the passage/question similarity matrix
pub enum SimilarityFunctionType {
    /// Dot product `x · y`
    dot_product,
    /// Cosine of the angle between `x` and `y`
    cosine,
    /// Bilinear form `x^T W y + b`
    bilinear,
    /// Trilinear combination `w · [x; y; x * y] + b`
    linear,
}

impl SimilarityFunctionType {
    /// Instantiates the similarity function, registering its parameters (if any) under `p`.
    pub fn build<'p, P>(&self, p: P, dim: i64) -> Box<dyn SimilarityFunction>
    where
        P: Borrow<nn::Path<'p>>,
    {
        match self {
            SimilarityFunctionType::dot_product => Box::new(DotProductSimilarity::new(false)),
            SimilarityFunctionType::cosine => Box::new(CosineSimilarity),
            SimilarityFunctionType::bilinear => Box::new(BilinearSimilarity::new(p, dim, dim)),
            SimilarityFunctionType::linear => Box::new(LinearSimilarity::new(p, dim)),
        }
    }
}

fn sum_last_dim(x: &Tensor) -> Tensor {
    x.sum_dim_intlist([-1].as_slice(), false, x.kind())
}

#[derive(Debug)]
pub struct DotProductSimilarity {
    scale_output: bool,
}

impl DotProductSimilarity {
    /// `scale_output` divides the dot product by `sqrt(dim)`.
    pub fn new(scale_output: bool) -> DotProductSimilarity {
        DotProductSimilarity { scale_output }
    }
}

impl SimilarityFunction for DotProductSimilarity {
    fn forward(&self, tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor {
        let result = sum_last_dim(&(tensor_1 * tensor_2));
        if self.scale_output {
            let dim = *tensor_1.size().last().unwrap_or(&1) as f64;
            result / dim.sqrt()
        } else {
            result
        }
    }
}

#[derive(Debug)]
pub struct CosineSimilarity;

impl SimilarityFunction for CosineSimilarity {
    fn forward(&self, tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor {
        let normalize = |x: &Tensor| {
            let norm = x
                .pow_tensor_scalar(2)
                .sum_dim_intlist([-1].as_slice(), true, x.kind())
                .sqrt();
            x / (norm + 1e-13)
        };
        sum_last_dim(&(normalize(tensor_1) * normalize(tensor_2)))
    }
}

/// Bilinear similarity `x^T W y + b`, with `W` of shape (*dim_1*, *dim_2*).
#[derive(Debug)]
pub struct BilinearSimilarity {
    weight: Tensor,
    bias: Tensor,
}

impl BilinearSimilarity {
    pub fn new<'p, P>(p: P, dim_1: i64, dim_2: i64) -> BilinearSimilarity
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let weight = p.var("weight", &[dim_1, dim_2], DEFAULT_KAIMING_UNIFORM);
        let bias = p.var("bias", &[1], nn::Init::Const(0.));
        BilinearSimilarity { weight, bias }
    }
}

impl SimilarityFunction for BilinearSimilarity {
    fn forward(&self, tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor {
        let intermediate = tensor_1.matmul(&self.weight);
        sum_last_dim(&(intermediate * tensor_2)) + &self.bias
    }
}

/// Trilinear similarity of the BiDAF paper: a learned weighting of `[x; y; x * y]`.
#[derive(Debug)]
pub struct LinearSimilarity {
    weight: Tensor,
    bias: Tensor,
}

impl LinearSimilarity {
    pub fn new<'p, P>(p: P, dim: i64) -> LinearSimilarity
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let combined_dim = 3 * dim;
        let std = (6.0 / (combined_dim as f64 + 1.0)).sqrt();
        let weight = p.var(
            "weight",
            &[combined_dim],
            nn::Init::Uniform { lo: -std, up: std },
        );
        let bias = p.var("bias", &[1], nn::Init::Const(0.));
        LinearSimilarity { weight, bias }
    }
}

impl SimilarityFunction for LinearSimilarity {
    fn forward(&self, tensor_1: &Tensor, tensor_2: &Tensor) -> Tensor {
        let product = tensor_1 * tensor_2;
        let combined = Tensor::cat(&[tensor_1, tensor_2, &product], -1);
        combined.matmul(&self.weight) + &self.bias
    }
}
