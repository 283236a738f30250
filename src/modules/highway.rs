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

use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # Highway network ([Srivastava et al., 2015](https://arxiv.org/abs/1505.00387))
///
/// Each layer computes `g * x + (1 - g) * relu(n)` where `[n, g] = W x + b` and `g` goes
/// through a sigmoid. Applied independently at every time step. With zero layers the
/// transform is the identity.
pub struct Highway {
    layers: Vec<nn::Linear>,
    input_dim: i64,
}

impl Highway {
    pub fn new<'p, P>(p: P, input_dim: i64, num_layers: i64) -> Highway
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow() / "layers";
        let mut layers = Vec::new();
        for layer_index in 0..num_layers {
            let layer = nn::linear(&p / layer_index, input_dim, input_dim * 2, Default::default());
            // gate half of the bias initialised to 1
            tch::no_grad(|| {
                if let Some(bias) = &layer.bs {
                    let _ = bias.narrow(0, input_dim, input_dim).fill_(1.0);
                }
            });
            layers.push(layer);
        }
        Highway { layers, input_dim }
    }

    pub fn input_dim(&self) -> i64 {
        self.input_dim
    }

    pub fn forward(&self, inputs: &Tensor) -> Tensor {
        let mut current_input = inputs.shallow_clone();
        for layer in &self.layers {
            let projected = current_input.apply(layer);
            let parts = projected.chunk(2, -1);
            let nonlinear_part = parts[0].relu();
            let gate = parts[1].sigmoid();
            current_input = &gate * &current_input + (1.0 - &gate) * nonlinear_part;
        }
        current_input
    }
}
