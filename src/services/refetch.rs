//! Threshold handling shared by both engines: validate, then either filter
//! locally or arm a debounced refetch.

use tracing::{debug, info, trace, warn};

use crate::action::FreqEvent;
use crate::core::base::{
    available_quantities, needs_refetch, validate_threshold, GeneralFreq2DState,
};
use crate::core::types::{FreqFilterQuantity, FreqQuantity};
use crate::error::{CtFreqError, Result};
use crate::services::scheduler::{FetchDebouncer, TimerId};

pub(crate) enum ThresholdOutcome {
    Rejected(FreqEvent),
    /// Loaded data suffices, filter locally
    Local,
    /// A refetch is pending; local data stays as is until it arrives
    Refetch,
}

/// Fallback threshold when a type switch invalidates the current value
fn default_threshold(min_freq_type: FreqFilterQuantity) -> &'static str {
    if min_freq_type.is_percentile() { "1" } else { "0" }
}

pub(crate) fn ensure_quantity_available(
    state: &GeneralFreq2DState,
    quantity: FreqQuantity,
) -> Result<()> {
    if available_quantities(state).contains(&quantity) {
        Ok(())
    } else {
        Err(CtFreqError::QuantityUnavailable(quantity))
    }
}

pub(crate) fn apply_min_freq(
    state: &mut GeneralFreq2DState,
    debouncer: &mut FetchDebouncer,
    value: String,
) -> ThresholdOutcome {
    if !validate_threshold(&value, state.min_freq_type) {
        debug!("rejected min. freq. {:?} for {}", value, state.min_freq_type);
        return ThresholdOutcome::Rejected(FreqEvent::MinFreqRejected { value });
    }
    state.min_freq = value;
    decide(state, debouncer)
}

pub(crate) fn apply_min_freq_type(
    state: &mut GeneralFreq2DState,
    debouncer: &mut FetchDebouncer,
    min_freq_type: FreqFilterQuantity,
) -> Result<ThresholdOutcome> {
    ensure_quantity_available(state, min_freq_type.quantity())?;
    state.min_freq_type = min_freq_type;
    if !validate_threshold(&state.min_freq, min_freq_type) {
        state.min_freq = default_threshold(min_freq_type).to_string();
    }
    Ok(decide(state, debouncer))
}

fn decide(state: &GeneralFreq2DState, debouncer: &mut FetchDebouncer) -> ThresholdOutcome {
    if needs_refetch(state) {
        info!(
            "min. freq. {} ({}) needs data below server floor {:?}, refetch in {:?}",
            state.min_freq,
            state.min_freq_type,
            state.server_min_freq,
            debouncer.delay()
        );
        debouncer.request();
        ThresholdOutcome::Refetch
    } else {
        // an earlier, lower threshold may have armed a refetch
        debouncer.cancel();
        ThresholdOutcome::Local
    }
}

pub(crate) fn debounce_elapsed(
    state: &mut GeneralFreq2DState,
    debouncer: &mut FetchDebouncer,
    id: TimerId,
) -> Option<FreqEvent> {
    if !debouncer.take_elapsed(id) {
        trace!("stale debounce timer {:?}", id);
        return None;
    }
    if !needs_refetch(state) {
        debug!("loaded data now covers min. freq. {}, refetch dropped", state.min_freq);
        return None;
    }
    if state.is_waiting {
        // a fetch is still outstanding, try again once it may have finished
        debouncer.request();
        return Some(FreqEvent::FetchScheduled);
    }
    state.is_waiting = true;
    Some(FreqEvent::FetchRequested(state.fetch_args()))
}

pub(crate) fn fetch_failed(state: &mut GeneralFreq2DState, message: String) -> CtFreqError {
    state.is_waiting = false;
    warn!("ct freq. data fetch failed: {}", message);
    CtFreqError::Fetch(message)
}
