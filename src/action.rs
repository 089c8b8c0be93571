use serde::{Deserialize, Serialize};
use strum::Display;

use crate::core::types::{
    AlphaLevel, ColorMapping, CtFreqResponse, Dimension, FetchArgs, FreqFilterQuantity,
    FreqQuantity, SortKey,
};
use crate::services::scheduler::TimerId;

/// Mutations accepted by the table engines.
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
pub enum FreqAction {
    /// User typed a new minimum frequency (raw form value)
    SetMinFreq(String),
    /// User switched the minimum frequency filter type
    SetMinFreqType(FreqFilterQuantity),
    SetAlphaLevel(AlphaLevel),
    /// Sort one axis of the matrix
    SortLabels { dim: Dimension, key: SortKey },
    /// Sort the flat list
    SortFlatList { key: SortKey, reversed: bool },
    TransposeTable,
    SetHideEmptyVectors(bool),
    SetColorMapping(ColorMapping),
    SetDisplayQuantity(FreqQuantity),
    /// A debounce timer armed through the scheduler elapsed
    DebounceElapsed(TimerId),
    /// Transport delivered a fresh server response
    DataLoaded(CtFreqResponse),
    /// Transport failed to deliver the requested data
    FetchFailed(String),
}

/// Notifications returned by the engines to their host.
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
pub enum FreqEvent {
    /// Threshold input did not validate; state is unchanged
    MinFreqRejected { value: String },
    /// A debounced refetch is pending
    FetchScheduled,
    /// The host should fetch data with these arguments and report back
    FetchRequested(FetchArgs),
    DataImported { cells: usize },
}
