pub mod export;
pub mod flat;
pub mod matrix;
mod refetch;
pub mod scheduler;
pub mod transport;

pub use export::{ExportAdapter, ExportPayload, Exportable, SaveFormat, SaveMode};
pub use flat::Freq2DFlatViewModel;
pub use matrix::Freq2DTableModel;
pub use scheduler::{ManualScheduler, Scheduler, TimerId, TokioScheduler};
pub use transport::{fetch_and_load, FreqTransport, JsonFileTransport};

use crate::action::{FreqAction, FreqEvent};
use crate::core::base::{GeneralFreq2DState, PercentileRanking};
use crate::error::Result;

/// Single reducer entry point of a table engine
pub trait FreqModel: PercentileRanking {
    fn state(&self) -> &GeneralFreq2DState;

    /// Apply one action; derived state is consistent again when this returns
    fn update(&mut self, action: FreqAction) -> Result<Option<FreqEvent>>;
}
