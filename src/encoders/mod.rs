//! # Headless sentence and pair encoders
//!
//! Encoders stopping at a fixed-size representation, without a task-specific head:
//! - `HeadlessSentEncoder`: masked max-pooled phrase encodings of a single sequence
//! - `HeadlessPairEncoder`: pooled encodings of two sequences combined by `SimplePairEncoder`
//!
//! The attention-based pair encoder lives in [`bidaf`](crate::bidaf).

mod headless;
mod phrase;
mod simple_pair;

pub use headless::{HeadlessPairEncoder, HeadlessSentEncoder};
pub use phrase::{PhraseEncoder, PhraseEncoderOutput};
pub use simple_pair::SimplePairEncoder;
