//! Boundary to the HTTP layer delivering ct freq. data.

use std::path::PathBuf;
use tracing::{debug, error};

use crate::action::{FreqAction, FreqEvent};
use crate::core::types::{CtFreqResponse, FetchArgs};
use crate::error::Result;
use crate::services::FreqModel;

/// Fetches two-dimensional frequency data; retries are its own business
pub trait FreqTransport {
    fn fetch(&self, args: &FetchArgs) -> std::result::Result<CtFreqResponse, String>;
}

/// Serves a previously saved server response from disk
#[derive(Debug, Clone)]
pub struct JsonFileTransport {
    pub path: PathBuf,
}

impl JsonFileTransport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FreqTransport for JsonFileTransport {
    fn fetch(&self, args: &FetchArgs) -> std::result::Result<CtFreqResponse, String> {
        debug!(
            "reading ct freq. data for {} x {} from {}",
            args.ctattr1,
            args.ctattr2,
            self.path.display()
        );
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("{}: {}", self.path.display(), e))?;
        serde_json::from_str(&raw).map_err(|e| format!("{}: {}", self.path.display(), e))
    }
}

/// Run one fetch through the transport and hand the outcome to the model
pub fn fetch_and_load<M: FreqModel + ?Sized>(
    model: &mut M,
    transport: &dyn FreqTransport,
    args: &FetchArgs,
) -> Result<Option<FreqEvent>> {
    match transport.fetch(args) {
        Ok(response) => model.update(FreqAction::DataLoaded(response)),
        Err(message) => {
            error!("fetch of {} x {} failed", args.ctattr1, args.ctattr2);
            model.update(FreqAction::FetchFailed(message))
        }
    }
}
