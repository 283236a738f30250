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

use crate::MtlError;
use tch::{Kind, Scalar};

/// Most negative finite value representable by a floating point `Kind`. Used as the additive
/// bias for padded positions: adding it to any finite activation can never win a maximum.
pub(crate) fn get_min_value(kind: Kind) -> Result<Scalar, MtlError> {
    Ok(match kind {
        Kind::Half => Scalar::float(half::f16::MIN.into()),
        Kind::Float => Scalar::float(f32::MIN.into()),
        Kind::BFloat16 => Scalar::float(half::bf16::MIN.into()),
        Kind::Double => Scalar::float(f64::MIN),
        _ => {
            return Err(MtlError::InvalidConfigurationError(format!(
                "Type not supported: attempted to get the minimum value for {kind:?}, expected a floating point kind"
            )))
        }
    })
}
