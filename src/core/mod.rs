pub mod base;
pub mod stats;
pub mod types;

pub use base::{FreqFormArgs, GeneralFreq2DState};
pub use types::*;
