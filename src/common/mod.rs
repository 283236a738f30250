pub(crate) mod activations;
pub mod config;
pub(crate) mod dropout;
pub mod error;
pub(crate) mod kind;
pub mod masking;

pub use activations::Activation;
pub use config::Config;
pub use dropout::Dropout;
