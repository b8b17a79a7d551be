//! Join synthesis.

mod synthesizer;

pub use synthesizer::{JoinRequest, JoinSynthesizer};
