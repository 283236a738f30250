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

use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MtlError {
    #[error("IO error: {0}")]
    IOError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Configuration parsing error: {0}")]
    ParsingError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Invalid classifier kind: {0}")]
    InvalidClassifierKind(String),

    #[error("No classifier registered for task: {0}")]
    UnregisteredTaskError(String),

    #[error("Missing second input for pair task: {0}")]
    MissingPairInputError(String),

    #[error("Degenerate mask error: {0}")]
    DegenerateMaskError(String),

    #[error("Shape mismatch error: {0}")]
    ShapeMismatchError(String),
}

impl From<std::io::Error> for MtlError {
    fn from(error: std::io::Error) -> Self {
        MtlError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for MtlError {
    fn from(error: serde_json::Error) -> Self {
        MtlError::ParsingError(error.to_string())
    }
}

impl From<TchError> for MtlError {
    fn from(error: TchError) -> Self {
        MtlError::TchError(error.to_string())
    }
}
