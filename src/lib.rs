#![allow(clippy::collapsible_if)]

pub mod action;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod services;

// Re-export commonly used types
pub use crate::action::{FreqAction, FreqEvent};
pub use crate::core::{CtFreqCell, CtFreqResponse, FreqFormArgs, FreqDataItem};
pub use crate::error::{CtFreqError, Result};
pub use crate::services::{FreqModel, Freq2DFlatViewModel, Freq2DTableModel};
