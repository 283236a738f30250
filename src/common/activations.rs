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
use tch::Tensor;

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// # Activation function used in the feed-forward layers and classifier heads
pub enum Activation {
    /// Rectified Linear Unit
    relu,
    /// Hyperbolic tangent
    tanh,
    /// Logistic sigmoid
    sigmoid,
    /// Gaussian Error Linear Unit ([Hendrycks et al., 2016,](https://arxiv.org/abs/1606.08415))
    gelu,
    /// Identity
    linear,
}

impl Activation {
    pub fn get_function(&self) -> fn(&Tensor) -> Tensor {
        match self {
            Activation::relu => _relu,
            Activation::tanh => _tanh,
            Activation::sigmoid => _sigmoid,
            Activation::gelu => _gelu,
            Activation::linear => _linear,
        }
    }
}

pub fn _relu(x: &Tensor) -> Tensor {
    x.relu()
}

pub fn _tanh(x: &Tensor) -> Tensor {
    x.tanh()
}

pub fn _sigmoid(x: &Tensor) -> Tensor {
    x.sigmoid()
}

pub fn _gelu(x: &Tensor) -> Tensor {
    x * 0.5 * (1.0 + (x / (2.0f64).sqrt()).erf())
}

pub fn _linear(x: &Tensor) -> Tensor {
    x.shallow_clone()
}
