//! Freq2DFlatViewModel: the same cells as the matrix, presented as a sortable list.

use std::cmp::Ordering;
use tracing::{debug, trace};

use crate::action::{FreqAction, FreqEvent};
use crate::config::EngineSettings;
use crate::core::base::{
    assign_orig_orders, create_min_freq_filter_fn, generate_pfilter, server_abs_floor,
    FreqFormArgs, GeneralFreq2DState, PercentileRanking, PercentileSortMapping,
};
use crate::core::types::{CtFreqCell, CtFreqResponse, FreqDataItem, FreqQuantity, RawFreqRow, SortKey};
use crate::error::Result;
use crate::services::refetch::{
    apply_min_freq, apply_min_freq_type, debounce_elapsed, fetch_failed, ThresholdOutcome,
};
use crate::services::scheduler::{FetchDebouncer, Scheduler};
use crate::services::FreqModel;

pub struct Freq2DFlatViewModel {
    state: GeneralFreq2DState,
    orig_data: Vec<FreqDataItem>,
    data: Vec<FreqDataItem>,
    sort_by: SortKey,
    sort_reversed: bool,
    debouncer: FetchDebouncer,
}

impl Freq2DFlatViewModel {
    pub fn new(
        args: FreqFormArgs,
        settings: &EngineSettings,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        Self {
            state: GeneralFreq2DState::new(args),
            orig_data: Vec::new(),
            data: Vec::new(),
            sort_by: SortKey::Ipm,
            sort_reversed: false,
            debouncer: FetchDebouncer::new(settings.debounce(), scheduler),
        }
    }

    pub fn import_data(&mut self, response: &CtFreqResponse) -> Result<usize> {
        let orders = assign_orig_orders(&response.data);
        self.orig_data = response
            .data
            .iter()
            .zip(orders)
            .filter(|(RawFreqRow(_, _, abs, total), _)| *abs > 0 && abs <= total)
            .map(|(RawFreqRow(v1, v2, abs, total), order)| FreqDataItem {
                val1: v1.clone(),
                val2: v2.clone(),
                cell: CtFreqCell::new(
                    order,
                    *abs,
                    *total,
                    self.state.alpha_level,
                    generate_pfilter(&self.state, v1, v2),
                ),
            })
            .collect();
        self.state.full_size = Some(response.full_size);
        self.state.server_min_freq = server_abs_floor(&response.ctfreq_form_args);
        self.state.is_waiting = false;
        debug!(
            "imported {} flat items, server min. freq. {:?}",
            self.orig_data.len(),
            self.state.server_min_freq
        );
        self.update_local_data()?;
        Ok(self.orig_data.len())
    }

    pub fn update_local_data(&mut self) -> Result<()> {
        let filter = create_min_freq_filter_fn(&self.state, &*self)?;
        self.data = self
            .orig_data
            .iter()
            .filter(|item| filter(&item.cell))
            .cloned()
            .collect();
        self.resort_local_data();
        Ok(())
    }

    /// Sort the displayed items without touching the network
    pub fn resort_local_data(&mut self) {
        let mut data = std::mem::take(&mut self.data);
        match self.sort_by {
            SortKey::Attr => data.sort_by(by_attr),
            SortKey::Abs => data.sort_by(|a, b| b.cell.abs.cmp(&a.cell.abs).then_with(|| by_attr(a, b))),
            SortKey::Ipm => {
                data.sort_by(|a, b| b.cell.ipm.total_cmp(&a.cell.ipm).then_with(|| by_attr(a, b)))
            }
        }
        if self.sort_reversed {
            data.reverse();
        }
        trace!("flat list sorted by {} (reversed: {})", self.sort_by, self.sort_reversed);
        self.data = data;
    }

    pub fn recalculate_conf_intervals(&mut self) -> Result<()> {
        let alpha = self.state.alpha_level;
        self.orig_data = self
            .orig_data
            .iter()
            .map(|item| FreqDataItem {
                cell: item.cell.with_alpha(alpha),
                ..item.clone()
            })
            .collect();
        self.update_local_data()
    }

    pub fn state(&self) -> &GeneralFreq2DState {
        &self.state
    }

    pub fn data(&self) -> &[FreqDataItem] {
        &self.data
    }

    pub fn orig_data(&self) -> &[FreqDataItem] {
        &self.orig_data
    }

    pub fn sort_by(&self) -> SortKey {
        self.sort_by
    }

    pub fn sort_reversed(&self) -> bool {
        self.sort_reversed
    }

    pub fn is_waiting(&self) -> bool {
        self.state.is_waiting
    }
}

fn by_attr(a: &FreqDataItem, b: &FreqDataItem) -> Ordering {
    a.val1.cmp(&b.val1).then_with(|| a.val2.cmp(&b.val2))
}

impl PercentileRanking for Freq2DFlatViewModel {
    fn create_percentile_sort_mapping(&self, quantity: FreqQuantity) -> PercentileSortMapping {
        PercentileSortMapping::from_values(
            self.orig_data
                .iter()
                .map(|item| (item.cell.orig_order, item.cell.value_of(quantity)))
                .collect(),
        )
    }
}

impl FreqModel for Freq2DFlatViewModel {
    fn state(&self) -> &GeneralFreq2DState {
        &self.state
    }

    fn update(&mut self, action: FreqAction) -> Result<Option<FreqEvent>> {
        let outcome = match action {
            FreqAction::SetMinFreq(value) => {
                apply_min_freq(&mut self.state, &mut self.debouncer, value)
            }
            FreqAction::SetMinFreqType(min_freq_type) => {
                apply_min_freq_type(&mut self.state, &mut self.debouncer, min_freq_type)?
            }
            FreqAction::SetAlphaLevel(alpha) => {
                self.state.alpha_level = alpha;
                self.recalculate_conf_intervals()?;
                return Ok(None);
            }
            FreqAction::SortFlatList { key, reversed } => {
                self.sort_by = key;
                self.sort_reversed = reversed;
                self.resort_local_data();
                return Ok(None);
            }
            FreqAction::DebounceElapsed(id) => {
                return Ok(debounce_elapsed(&mut self.state, &mut self.debouncer, id));
            }
            FreqAction::DataLoaded(response) => {
                let cells = self.import_data(&response)?;
                return Ok(Some(FreqEvent::DataImported { cells }));
            }
            FreqAction::FetchFailed(message) => {
                return Err(fetch_failed(&mut self.state, message));
            }
            FreqAction::SortLabels { .. }
            | FreqAction::TransposeTable
            | FreqAction::SetHideEmptyVectors(_)
            | FreqAction::SetColorMapping(_)
            | FreqAction::SetDisplayQuantity(_) => {
                trace!("matrix-only action ignored by the flat view");
                return Ok(None);
            }
        };
        match outcome {
            ThresholdOutcome::Rejected(event) => Ok(Some(event)),
            ThresholdOutcome::Local => {
                self.update_local_data()?;
                Ok(None)
            }
            ThresholdOutcome::Refetch => Ok(Some(FreqEvent::FetchScheduled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AlphaLevel, CtFreqFormArgs, FreqFilterQuantity};
    use crate::services::scheduler::ManualScheduler;
    use pretty_assertions::assert_eq;

    fn model() -> Freq2DFlatViewModel {
        let args = FreqFormArgs {
            attr1: "lemma".to_string(),
            attr2: "doc.genre".to_string(),
            ct_fcrit1: "0<0".to_string(),
            ct_fcrit2: "0<0".to_string(),
            min_freq: "2".to_string(),
            min_freq_type: FreqFilterQuantity::Abs,
            alpha_level: AlphaLevel::Level5,
            uses_adhoc_subcorpus: false,
        };
        let mut m = Freq2DFlatViewModel::new(
            args,
            &EngineSettings::default(),
            Box::new(ManualScheduler::new()),
        );
        m.import_data(&CtFreqResponse {
            data: vec![
                RawFreqRow("cat".into(), "news".into(), 4, 1000),
                RawFreqRow("ant".into(), "poem".into(), 4, 100),
                RawFreqRow("ant".into(), "news".into(), 9, 1000),
                RawFreqRow("dog".into(), "poem".into(), 1, 100),
                RawFreqRow("bee".into(), "news".into(), 0, 1000),
            ],
            full_size: 8,
            ctfreq_form_args: CtFreqFormArgs {
                ctminfreq: Some(1),
                ctminfreq_type: Some(FreqFilterQuantity::Abs),
            },
        })
        .unwrap();
        m
    }

    fn pairs(m: &Freq2DFlatViewModel) -> Vec<(&str, &str)> {
        m.data()
            .iter()
            .map(|i| (i.val1.as_str(), i.val2.as_str()))
            .collect()
    }

    #[test]
    fn test_import_skips_zero_counts_and_filters() {
        let m = model();
        assert_eq!(m.orig_data().len(), 4);
        assert_eq!(m.data().len(), 3);
        assert!(m.data().iter().all(|i| i.cell.abs >= 2));
    }

    #[test]
    fn test_resort_by_attr() {
        let mut m = model();
        m.update(FreqAction::SortFlatList {
            key: SortKey::Attr,
            reversed: false,
        })
        .unwrap();
        assert_eq!(
            pairs(&m),
            vec![("ant", "news"), ("ant", "poem"), ("cat", "news")]
        );
    }

    #[test]
    fn test_resort_by_abs_breaks_ties_by_attr() {
        let mut m = model();
        m.update(FreqAction::SortFlatList {
            key: SortKey::Abs,
            reversed: false,
        })
        .unwrap();
        assert_eq!(
            pairs(&m),
            vec![("ant", "news"), ("ant", "poem"), ("cat", "news")]
        );
    }

    #[test]
    fn test_resort_by_ipm_reversed() {
        let mut m = model();
        m.update(FreqAction::SortFlatList {
            key: SortKey::Ipm,
            reversed: true,
        })
        .unwrap();
        // ipm: cat/news 4000, ant/news 9000, ant/poem 40000
        assert_eq!(
            pairs(&m),
            vec![("cat", "news"), ("ant", "news"), ("ant", "poem")]
        );
    }

    #[test]
    fn test_local_threshold_change() {
        let mut m = model();
        let event = m.update(FreqAction::SetMinFreq("5".to_string())).unwrap();
        assert_eq!(event, None);
        assert_eq!(pairs(&m), vec![("ant", "news")]);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let mut m = model();
        let event = m.update(FreqAction::SetMinFreq("5x".to_string())).unwrap();
        assert_eq!(
            event,
            Some(FreqEvent::MinFreqRejected {
                value: "5x".to_string()
            })
        );
        assert_eq!(m.state().min_freq, "2");
        assert_eq!(m.data().len(), 3);
    }

    #[test]
    fn test_matrix_only_actions_are_ignored() {
        let mut m = model();
        assert_eq!(m.update(FreqAction::TransposeTable).unwrap(), None);
        assert_eq!(m.state().attr1, "lemma");
    }
}
