//! Freq2DTableModel: the row x column view of a two-dimensional frequency
//! distribution.
//!
//! The model keeps the imported cells (`orig_data`) untouched between fetches
//! and derives the displayed table (`data`), the label visibility and the heat
//! map colors from them on every change.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace, warn};

use crate::action::{FreqAction, FreqEvent};
use crate::config::{EngineSettings, Palette};
use crate::core::base::{
    assign_orig_orders, available_quantities, create_min_freq_filter_fn, generate_pfilter,
    server_abs_floor, FreqFormArgs, GeneralFreq2DState, PercentileRanking, PercentileSortMapping,
};
use crate::core::types::{
    AxisLabel, ChartItem, ColorMapping, CtFreqCell, CtFreqResponse, Data2DTable, Dimension,
    FreqQuantity, RawFreqRow, SortKey, TableInfo,
};
use crate::error::Result;
use crate::services::refetch::{
    apply_min_freq, apply_min_freq_type, debounce_elapsed, ensure_quantity_available,
    fetch_failed, ThresholdOutcome,
};
use crate::services::scheduler::{FetchDebouncer, Scheduler};
use crate::services::FreqModel;

/// Palette bucket of every value
///
/// Linear mapping spreads `[min, max]` over the palette; percentile mapping
/// uses the position within the ascending order, so equal values may land in
/// different buckets. When all values are equal everything goes to bucket 0.
pub fn heatmap_buckets(values: &[f64], mapping: ColorMapping, palette_size: usize) -> Vec<usize> {
    let n = values.len();
    if n == 0 || palette_size == 0 {
        return vec![0; n];
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        return vec![0; n];
    }
    let top = palette_size - 1;
    match mapping {
        ColorMapping::Linear => values
            .iter()
            .map(|v| (((v - min) / (max - min) * top as f64).floor() as usize).min(top))
            .collect(),
        ColorMapping::Percentile => {
            let mut idx: Vec<usize> = (0..n).collect();
            idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            let mut buckets = vec![0; n];
            for (rank, i) in idx.into_iter().enumerate() {
                buckets[i] = (rank * palette_size / n).min(top);
            }
            buckets
        }
    }
}

pub struct Freq2DTableModel {
    state: GeneralFreq2DState,
    orig_data: Data2DTable,
    data: Data2DTable,
    d1_labels: Vec<AxisLabel>,
    d2_labels: Vec<AxisLabel>,
    sort_dim1: SortKey,
    sort_dim2: SortKey,
    hide_empty_vectors: bool,
    color_mapping: ColorMapping,
    display_quantity: FreqQuantity,
    palette: Palette,
    debouncer: FetchDebouncer,
}

impl Freq2DTableModel {
    pub fn new(
        args: FreqFormArgs,
        settings: &EngineSettings,
        scheduler: Box<dyn Scheduler>,
    ) -> Self {
        let state = GeneralFreq2DState::new(args);
        let display_quantity = if available_quantities(&state).contains(&FreqQuantity::Ipm) {
            FreqQuantity::Ipm
        } else {
            FreqQuantity::Abs
        };
        Self {
            state,
            orig_data: Data2DTable::new(),
            data: Data2DTable::new(),
            d1_labels: Vec::new(),
            d2_labels: Vec::new(),
            sort_dim1: SortKey::Attr,
            sort_dim2: SortKey::Attr,
            hide_empty_vectors: settings.hide_empty_vectors,
            color_mapping: settings.color_mapping,
            display_quantity,
            palette: settings.palette.clone(),
            debouncer: FetchDebouncer::new(settings.debounce(), scheduler),
        }
    }

    /// Replace the original data with a fresh server response
    ///
    /// Returns the number of imported non-zero cells.
    pub fn import_data(&mut self, response: &CtFreqResponse) -> Result<usize> {
        let orders = assign_orig_orders(&response.data);
        let mut d1_labels: Vec<AxisLabel> = Vec::new();
        let mut d2_labels: Vec<AxisLabel> = Vec::new();
        let mut seen1 = HashSet::new();
        let mut seen2 = HashSet::new();
        let mut table = Data2DTable::new();
        let mut cells = 0;

        for (RawFreqRow(v1, v2, abs, total), order) in response.data.iter().zip(orders) {
            if seen1.insert(v1.clone()) {
                d1_labels.push(AxisLabel {
                    value: v1.clone(),
                    visible: true,
                    order: d1_labels.len(),
                });
            }
            if seen2.insert(v2.clone()) {
                d2_labels.push(AxisLabel {
                    value: v2.clone(),
                    visible: true,
                    order: d2_labels.len(),
                });
            }
            let row = table.entry(v1.clone()).or_default();
            if *abs == 0 {
                continue;
            }
            if abs > total {
                warn!("skipping {}/{}: abs {} exceeds total {}", v1, v2, abs, total);
                continue;
            }
            row.insert(
                v2.clone(),
                CtFreqCell::new(
                    order,
                    *abs,
                    *total,
                    self.state.alpha_level,
                    generate_pfilter(&self.state, v1, v2),
                ),
            );
            cells += 1;
        }

        self.state.full_size = Some(response.full_size);
        self.state.server_min_freq = server_abs_floor(&response.ctfreq_form_args);
        self.state.is_waiting = false;
        self.orig_data = table;
        self.d1_labels = d1_labels;
        self.d2_labels = d2_labels;
        debug!(
            "imported {} cells ({} x {} labels), server min. freq. {:?}",
            cells,
            self.d1_labels.len(),
            self.d2_labels.len(),
            self.state.server_min_freq
        );
        self.update_local_data()?;
        Ok(cells)
    }

    /// Rebuild the displayed table from the original data
    pub fn update_local_data(&mut self) -> Result<()> {
        let filter = create_min_freq_filter_fn(&self.state, &*self)?;
        let mut data: Data2DTable = self
            .orig_data
            .iter()
            .map(|(v1, row)| {
                let kept = row
                    .iter()
                    .filter(|(_, cell)| filter(cell))
                    .map(|(v2, cell)| (v2.clone(), cell.clone()))
                    .collect();
                (v1.clone(), kept)
            })
            .collect();

        if self.hide_empty_vectors {
            let (rows, cols) = non_empty_vectors(&data, &self.d1_labels, &self.d2_labels);
            data.retain(|v1, _| rows.contains(v1));
            for row in data.values_mut() {
                row.retain(|v2, _| cols.contains(v2));
            }
            self.d1_labels = with_visibility(&self.d1_labels, |v| rows.contains(v));
            self.d2_labels = with_visibility(&self.d2_labels, |v| cols.contains(v));
        } else {
            self.d1_labels = with_visibility(&self.d1_labels, |_| true);
            self.d2_labels = with_visibility(&self.d2_labels, |_| true);
        }

        self.data = data;
        self.sort_labels(Dimension::First);
        self.sort_labels(Dimension::Second);
        self.recalc_heatmap();
        trace!("local data updated, {:?}", self.table_info());
        Ok(())
    }

    fn marginal_sums(&self, dim: Dimension, quantity: FreqQuantity) -> HashMap<String, f64> {
        let mut sums: HashMap<String, f64> = HashMap::new();
        for (v1, row) in &self.data {
            for (v2, cell) in row {
                let label = match dim {
                    Dimension::First => v1,
                    Dimension::Second => v2,
                };
                *sums.entry(label.clone()).or_insert(0.0) += cell.value_of(quantity);
            }
        }
        sums
    }

    /// Order one axis; ties keep their first-seen order
    fn sort_labels(&mut self, dim: Dimension) {
        let key = match dim {
            Dimension::First => self.sort_dim1,
            Dimension::Second => self.sort_dim2,
        };
        let sums = key.quantity().map(|q| self.marginal_sums(dim, q));
        let labels = match dim {
            Dimension::First => &mut self.d1_labels,
            Dimension::Second => &mut self.d2_labels,
        };
        match sums {
            None => labels.sort_by(|a, b| a.value.cmp(&b.value).then(a.order.cmp(&b.order))),
            Some(sums) => labels.sort_by(|a, b| {
                let sa = sums.get(&a.value).copied().unwrap_or(0.0);
                let sb = sums.get(&b.value).copied().unwrap_or(0.0);
                sb.total_cmp(&sa).then(a.order.cmp(&b.order))
            }),
        }
    }

    fn recalc_heatmap(&mut self) {
        let quantity = self.display_quantity;
        let mut positions: Vec<(String, String)> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for l1 in &self.d1_labels {
            let Some(row) = self.data.get(&l1.value) else {
                continue;
            };
            for l2 in &self.d2_labels {
                if let Some(cell) = row.get(&l2.value) {
                    positions.push((l1.value.clone(), l2.value.clone()));
                    values.push(cell.value_of(quantity));
                }
            }
        }
        let buckets = heatmap_buckets(&values, self.color_mapping, self.palette.len());
        for ((v1, v2), bucket) in positions.iter().zip(buckets) {
            if let Some(cell) = self.data.get_mut(v1).and_then(|row| row.get_mut(v2)) {
                cell.bg_color = self.palette.get(bucket).cloned();
            }
        }
    }

    /// Swap rows and columns, including attribute roles and sort settings
    pub fn transpose_table(&mut self) -> Result<()> {
        self.state.transpose();
        std::mem::swap(&mut self.d1_labels, &mut self.d2_labels);
        std::mem::swap(&mut self.sort_dim1, &mut self.sort_dim2);

        let mut transposed: Data2DTable = self
            .d1_labels
            .iter()
            .map(|label| (label.value.clone(), BTreeMap::new()))
            .collect();
        for (v1, row) in &self.orig_data {
            for (v2, cell) in row {
                transposed.entry(v2.clone()).or_default().insert(
                    v1.clone(),
                    CtFreqCell {
                        pfilter: generate_pfilter(&self.state, v2, v1),
                        ..cell.clone()
                    },
                );
            }
        }
        self.orig_data = transposed;
        debug!("table transposed to {} x {}", self.state.attr1, self.state.attr2);
        self.update_local_data()
    }

    /// Recompute every interval for the current alpha level
    pub fn recalculate_conf_intervals(&mut self) -> Result<()> {
        let alpha = self.state.alpha_level;
        self.orig_data = self
            .orig_data
            .iter()
            .map(|(v1, row)| {
                let row = row
                    .iter()
                    .map(|(v2, cell)| (v2.clone(), cell.with_alpha(alpha)))
                    .collect();
                (v1.clone(), row)
            })
            .collect();
        self.update_local_data()
    }

    pub fn state(&self) -> &GeneralFreq2DState {
        &self.state
    }

    pub fn data(&self) -> &Data2DTable {
        &self.data
    }

    pub fn orig_data(&self) -> &Data2DTable {
        &self.orig_data
    }

    pub fn d1_labels(&self) -> &[AxisLabel] {
        &self.d1_labels
    }

    pub fn d2_labels(&self) -> &[AxisLabel] {
        &self.d2_labels
    }

    pub fn visible_labels(&self, dim: Dimension) -> impl Iterator<Item = &AxisLabel> {
        let labels = match dim {
            Dimension::First => &self.d1_labels,
            Dimension::Second => &self.d2_labels,
        };
        labels.iter().filter(|l| l.visible)
    }

    pub fn cell(&self, v1: &str, v2: &str) -> Option<&CtFreqCell> {
        self.data.get(v1).and_then(|row| row.get(v2))
    }

    pub fn sort_key(&self, dim: Dimension) -> SortKey {
        match dim {
            Dimension::First => self.sort_dim1,
            Dimension::Second => self.sort_dim2,
        }
    }

    pub fn color_mapping(&self) -> ColorMapping {
        self.color_mapping
    }

    pub fn display_quantity(&self) -> FreqQuantity {
        self.display_quantity
    }

    pub fn hide_empty_vectors(&self) -> bool {
        self.hide_empty_vectors
    }

    pub fn is_waiting(&self) -> bool {
        self.state.is_waiting
    }

    pub fn table_info(&self) -> TableInfo {
        let rows = self.visible_labels(Dimension::First).count();
        let cols = self.visible_labels(Dimension::Second).count();
        let mut info = TableInfo {
            size: rows * cols,
            ..TableInfo::default()
        };
        for cell in self.data.values().flat_map(|row| row.values()) {
            if cell.abs > 0 {
                info.num_non_zero += 1;
                info.total_abs += cell.abs;
            }
        }
        info
    }

    /// Interval triplets of one row (`First`) or column (`Second`) for the chart
    pub fn export_group(&self, dim: Dimension, label: &str) -> Vec<ChartItem> {
        let quantity = self.display_quantity;
        let item = |cell: &CtFreqCell, label: &str| {
            let (low, high) = cell.interval_of(quantity);
            ChartItem {
                data: [low, cell.value_of(quantity), high],
                label: label.to_string(),
            }
        };
        match dim {
            Dimension::First => match self.data.get(label) {
                Some(row) => self
                    .visible_labels(Dimension::Second)
                    .filter_map(|l2| row.get(&l2.value).map(|c| item(c, &l2.value)))
                    .collect(),
                None => Vec::new(),
            },
            Dimension::Second => self
                .visible_labels(Dimension::First)
                .filter_map(|l1| self.cell(&l1.value, label).map(|c| item(c, &l1.value)))
                .collect(),
        }
    }

    pub fn export_group_label(&self, dim: Dimension, label: &str) -> String {
        let attr = match dim {
            Dimension::First => &self.state.attr1,
            Dimension::Second => &self.state.attr2,
        };
        format!("{}: {}", attr, label)
    }
}

/// Rows and columns holding at least one non-zero cell, tested against all labels
fn non_empty_vectors(
    data: &Data2DTable,
    d1_labels: &[AxisLabel],
    d2_labels: &[AxisLabel],
) -> (HashSet<String>, HashSet<String>) {
    let non_zero = |v1: &str, v2: &str| {
        data.get(v1)
            .and_then(|row| row.get(v2))
            .is_some_and(|cell| cell.abs > 0)
    };
    let rows = d1_labels
        .iter()
        .filter(|l1| d2_labels.iter().any(|l2| non_zero(&l1.value, &l2.value)))
        .map(|l| l.value.clone())
        .collect();
    let cols = d2_labels
        .iter()
        .filter(|l2| d1_labels.iter().any(|l1| non_zero(&l1.value, &l2.value)))
        .map(|l| l.value.clone())
        .collect();
    (rows, cols)
}

fn with_visibility(labels: &[AxisLabel], visible: impl Fn(&str) -> bool) -> Vec<AxisLabel> {
    labels
        .iter()
        .map(|l| AxisLabel {
            visible: visible(&l.value),
            ..l.clone()
        })
        .collect()
}

impl PercentileRanking for Freq2DTableModel {
    fn create_percentile_sort_mapping(&self, quantity: FreqQuantity) -> PercentileSortMapping {
        PercentileSortMapping::from_values(
            self.orig_data
                .values()
                .flat_map(|row| row.values())
                .map(|cell| (cell.orig_order, cell.value_of(quantity)))
                .collect(),
        )
    }
}

impl FreqModel for Freq2DTableModel {
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
            FreqAction::SortLabels { dim, key } => {
                match dim {
                    Dimension::First => self.sort_dim1 = key,
                    Dimension::Second => self.sort_dim2 = key,
                }
                self.sort_labels(dim);
                self.recalc_heatmap();
                return Ok(None);
            }
            FreqAction::TransposeTable => {
                self.transpose_table()?;
                return Ok(None);
            }
            FreqAction::SetHideEmptyVectors(hide) => {
                self.hide_empty_vectors = hide;
                self.update_local_data()?;
                return Ok(None);
            }
            FreqAction::SetColorMapping(mapping) => {
                self.color_mapping = mapping;
                self.recalc_heatmap();
                return Ok(None);
            }
            FreqAction::SetDisplayQuantity(quantity) => {
                ensure_quantity_available(&self.state, quantity)?;
                self.display_quantity = quantity;
                self.recalc_heatmap();
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
            FreqAction::SortFlatList { .. } => {
                trace!("flat list sort ignored by the matrix view");
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
