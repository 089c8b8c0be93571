//! State and operations shared by the matrix and the flat list engines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::stats::{is_struct_attr, validate_min_abs_freq_attr, validate_percentile};
use crate::core::types::{
    AlphaLevel, CtFreqCell, CtFreqFormArgs, FetchArgs, FreqFilterQuantity, FreqQuantity,
    RawFreqRow,
};
use crate::error::Result;

/// Initial form values of a two-dimensional frequency table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreqFormArgs {
    pub attr1: String,
    pub attr2: String,
    pub ct_fcrit1: String,
    pub ct_fcrit2: String,
    pub min_freq: String,
    pub min_freq_type: FreqFilterQuantity,
    pub alpha_level: AlphaLevel,
    pub uses_adhoc_subcorpus: bool,
}

/// Common state of both table engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralFreq2DState {
    pub attr1: String,
    pub attr2: String,
    /// Context window of the first attribute
    pub ct_fcrit1: String,
    /// Context window of the second attribute
    pub ct_fcrit2: String,
    /// Raw form value, only ever holds a validated string
    pub min_freq: String,
    pub min_freq_type: FreqFilterQuantity,
    pub alpha_level: AlphaLevel,
    pub uses_adhoc_subcorpus: bool,
    /// Number of all value combinations as reported by the server
    pub full_size: Option<u64>,
    /// Absolute frequency floor of the currently loaded data
    pub server_min_freq: Option<u64>,
    pub is_waiting: bool,
}

impl GeneralFreq2DState {
    pub fn new(args: FreqFormArgs) -> Self {
        Self {
            attr1: args.attr1,
            attr2: args.attr2,
            ct_fcrit1: args.ct_fcrit1,
            ct_fcrit2: args.ct_fcrit2,
            min_freq: args.min_freq,
            min_freq_type: args.min_freq_type,
            alpha_level: args.alpha_level,
            uses_adhoc_subcorpus: args.uses_adhoc_subcorpus,
            full_size: None,
            server_min_freq: None,
            is_waiting: false,
        }
    }

    pub fn min_freq_value(&self) -> u64 {
        self.min_freq.parse::<u64>().unwrap_or(0)
    }

    pub fn fetch_args(&self) -> FetchArgs {
        FetchArgs {
            ctattr1: self.attr1.clone(),
            ctattr2: self.attr2.clone(),
            ctfcrit1: self.ct_fcrit1.clone(),
            ctfcrit2: self.ct_fcrit2.clone(),
            ctminfreq: self.min_freq.clone(),
            ctminfreq_type: self.min_freq_type,
            alpha_level: self.alpha_level,
        }
    }

    /// Swap the roles of the two attributes
    pub fn transpose(&mut self) {
        std::mem::swap(&mut self.attr1, &mut self.attr2);
        std::mem::swap(&mut self.ct_fcrit1, &mut self.ct_fcrit2);
    }
}

/// Threshold input check for the given filter type
pub fn validate_threshold(value: &str, min_freq_type: FreqFilterQuantity) -> bool {
    if min_freq_type.is_percentile() {
        validate_percentile(value)
    } else {
        validate_min_abs_freq_attr(value)
    }
}

/// Structural attributes have no positional token universe to compute ipm against
pub fn can_provide_ipm(state: &GeneralFreq2DState) -> bool {
    !(is_struct_attr(&state.attr1) && is_struct_attr(&state.attr2))
}

/// Quantities selectable for display, coloring and filtering
///
/// Ad-hoc subcorpora only know an estimate of structure sizes, so ipm is
/// unavailable there as soon as a structural attribute is involved.
pub fn available_quantities(state: &GeneralFreq2DState) -> Vec<FreqQuantity> {
    let adhoc_struct = state.uses_adhoc_subcorpus
        && (is_struct_attr(&state.attr1) || is_struct_attr(&state.attr2));
    if can_provide_ipm(state) && !adhoc_struct {
        vec![FreqQuantity::Abs, FreqQuantity::Ipm]
    } else {
        vec![FreqQuantity::Abs]
    }
}

/// Decide whether the requested threshold needs data the server has not sent
///
/// The server floor is an absolute frequency. Everything below it is missing
/// locally; absolute percentiles account for the missing cells through the
/// empty ratio, ipm based filters can only be served locally when nothing but
/// zero cells is missing.
pub fn needs_refetch(state: &GeneralFreq2DState) -> bool {
    let Some(floor) = state.server_min_freq else {
        return true;
    };
    match state.min_freq_type {
        FreqFilterQuantity::Abs => state.min_freq_value() < floor,
        FreqFilterQuantity::AbsPercentile => false,
        FreqFilterQuantity::Ipm | FreqFilterQuantity::IpmPercentile => floor > 1,
    }
}

/// Rank of every original cell within the population sorted by a quantity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PercentileSortMapping {
    /// `orig_order` -> 0-based rank
    pub ranks: HashMap<usize, usize>,
    pub ranked_size: usize,
}

impl PercentileSortMapping {
    /// Rank `(orig_order, value)` pairs ascending by value; ties sharing an
    /// `orig_order` end up with the highest rank among them.
    pub fn from_values(mut values: Vec<(usize, f64)>) -> Self {
        values.sort_by(|a, b| a.1.total_cmp(&b.1));
        let ranked_size = values.len();
        let ranks = values
            .into_iter()
            .enumerate()
            .map(|(rank, (order, _))| (order, rank))
            .collect();
        Self { ranks, ranked_size }
    }
}

/// Engines rank their whole original population for percentile filtering
pub trait PercentileRanking {
    fn create_percentile_sort_mapping(&self, quantity: FreqQuantity) -> PercentileSortMapping;
}

pub type MinFreqFilter = Box<dyn Fn(&CtFreqCell) -> bool>;

/// Build the minimum frequency predicate for the current threshold
pub fn create_min_freq_filter_fn(
    state: &GeneralFreq2DState,
    ranking: &dyn PercentileRanking,
) -> Result<MinFreqFilter> {
    let min_freq = state.min_freq_value();
    match state.min_freq_type {
        FreqFilterQuantity::Abs => Ok(Box::new(move |cell| cell.abs >= min_freq)),
        FreqFilterQuantity::Ipm => Ok(Box::new(move |cell| cell.ipm >= min_freq as f64)),
        FreqFilterQuantity::AbsPercentile | FreqFilterQuantity::IpmPercentile => {
            let mapping = ranking.create_percentile_sort_mapping(state.min_freq_type.quantity());
            let ranked = mapping.ranked_size as f64;
            let full_size = (state.full_size.unwrap_or(0) as f64).max(ranked);
            if full_size == 0.0 {
                return Ok(Box::new(|_| false));
            }
            let empty_ratio = 1.0 - ranked / full_size;
            let limit = min_freq as f64 / 100.0;
            let ranks = mapping.ranks;
            Ok(Box::new(move |cell| match ranks.get(&cell.orig_order) {
                Some(rank) => *rank as f64 / full_size + empty_ratio >= limit,
                None => false,
            }))
        }
    }
}

/// Assign percentile sort keys to raw rows
///
/// Rows are walked in response order; the key grows only when `abs` strictly
/// increases over the previous row, so a run of equal frequencies shares a key.
pub fn assign_orig_orders(rows: &[RawFreqRow]) -> Vec<usize> {
    let mut current = 0;
    let mut prev: Option<u64> = None;
    rows.iter()
        .map(|RawFreqRow(_, _, abs, _)| {
            if prev.is_some_and(|p| *abs > p) {
                current += 1;
            }
            prev = Some(*abs);
            current
        })
        .collect()
}

/// Absolute frequency floor of a response; thresholds echoed in other units are unknown
pub fn server_abs_floor(args: &CtFreqFormArgs) -> Option<u64> {
    match args.ctminfreq_type {
        None | Some(FreqFilterQuantity::Abs) => args.ctminfreq,
        Some(_) => None,
    }
}

fn escape_query_value(v: &str) -> String {
    regex::escape(v).replace('"', "\\\"")
}

fn split_struct_attr(attr: &str) -> (&str, &str) {
    attr.split_once('.').unwrap_or((attr, ""))
}

/// Positive filter query selecting concordance lines with the given pair of values
pub fn generate_pfilter(state: &GeneralFreq2DState, v1: &str, v2: &str) -> String {
    let e1 = escape_query_value(v1);
    let e2 = escape_query_value(v2);
    match (is_struct_attr(&state.attr1), is_struct_attr(&state.attr2)) {
        (false, false) => format!(
            "p{} {} 0 [{}=\"{}\" & {}=\"{}\"]",
            state.ct_fcrit1, state.ct_fcrit2, state.attr1, e1, state.attr2, e2
        ),
        (true, false) => {
            let (s1, a1) = split_struct_attr(&state.attr1);
            format!(
                "p{} {} 0 [{}=\"{}\"] within <{} {}=\"{}\" />",
                state.ct_fcrit2, state.ct_fcrit2, state.attr2, e2, s1, a1, e1
            )
        }
        (false, true) => {
            let (s2, a2) = split_struct_attr(&state.attr2);
            format!(
                "p{} {} 0 [{}=\"{}\"] within <{} {}=\"{}\" />",
                state.ct_fcrit1, state.ct_fcrit1, state.attr1, e1, s2, a2, e2
            )
        }
        (true, true) => {
            let (s1, a1) = split_struct_attr(&state.attr1);
            let (s2, a2) = split_struct_attr(&state.attr2);
            format!(
                "p0 0 0 [] within <{} {}=\"{}\" /> within <{} {}=\"{}\" />",
                s1, a1, e1, s2, a2, e2
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state(attr1: &str, attr2: &str) -> GeneralFreq2DState {
        GeneralFreq2DState::new(FreqFormArgs {
            attr1: attr1.to_string(),
            attr2: attr2.to_string(),
            ct_fcrit1: "0<0".to_string(),
            ct_fcrit2: "1<0".to_string(),
            min_freq: "5".to_string(),
            min_freq_type: FreqFilterQuantity::Abs,
            alpha_level: AlphaLevel::Level5,
            uses_adhoc_subcorpus: false,
        })
    }

    struct FixedRanking(Vec<(usize, f64)>);

    impl PercentileRanking for FixedRanking {
        fn create_percentile_sort_mapping(&self, _q: FreqQuantity) -> PercentileSortMapping {
            PercentileSortMapping::from_values(self.0.clone())
        }
    }

    fn cell(order: usize, abs: u64) -> CtFreqCell {
        CtFreqCell::new(order, abs, 1000, AlphaLevel::Level5, String::new())
    }

    #[test]
    fn test_pfilter_positional_pair() {
        let s = state("word", "tag");
        assert_eq!(
            generate_pfilter(&s, "dog", "NN"),
            r#"p0<0 1<0 0 [word="dog" & tag="NN"]"#
        );
    }

    #[test]
    fn test_pfilter_struct_first() {
        let s = state("doc.author", "lemma");
        assert_eq!(
            generate_pfilter(&s, "Poe", "raven"),
            r#"p1<0 1<0 0 [lemma="raven"] within <doc author="Poe" />"#
        );
    }

    #[test]
    fn test_pfilter_struct_second() {
        let s = state("lemma", "doc.year");
        assert_eq!(
            generate_pfilter(&s, "raven", "1845"),
            r#"p0<0 0<0 0 [lemma="raven"] within <doc year="1845" />"#
        );
    }

    #[test]
    fn test_pfilter_struct_pair_escapes_values() {
        let s = state("doc.author", "text.genre");
        assert_eq!(
            generate_pfilter(&s, "A. \"B\"", "poem"),
            r#"p0 0 0 [] within <doc author="A\. \"B\"" /> within <text genre="poem" />"#
        );
    }

    #[test]
    fn test_can_provide_ipm() {
        assert!(can_provide_ipm(&state("word", "tag")));
        assert!(can_provide_ipm(&state("doc.id", "tag")));
        assert!(!can_provide_ipm(&state("doc.id", "text.genre")));
    }

    #[test]
    fn test_available_quantities_adhoc() {
        let mut s = state("doc.id", "tag");
        assert_eq!(available_quantities(&s), vec![FreqQuantity::Abs, FreqQuantity::Ipm]);
        s.uses_adhoc_subcorpus = true;
        assert_eq!(available_quantities(&s), vec![FreqQuantity::Abs]);
    }

    #[test]
    fn test_abs_filter() {
        let s = state("word", "tag");
        let filter = create_min_freq_filter_fn(&s, &FixedRanking(vec![])).unwrap();
        assert!(filter(&cell(0, 5)));
        assert!(!filter(&cell(0, 4)));
    }

    #[test]
    fn test_percentile_filter_counts_missing_cells() {
        let mut s = state("word", "tag");
        s.min_freq_type = FreqFilterQuantity::AbsPercentile;
        s.min_freq = "50".to_string();
        s.full_size = Some(8);
        // four cells locally, four more never sent by the server
        let ranking = FixedRanking(vec![(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0)]);
        let filter = create_min_freq_filter_fn(&s, &ranking).unwrap();
        // empty ratio 0.5: rank 0 already reaches the 50th percentile
        assert!(filter(&cell(0, 1)));
        assert!(filter(&cell(3, 4)));

        s.min_freq = "80".to_string();
        let filter = create_min_freq_filter_fn(&s, &ranking).unwrap();
        // rank/8 + 0.5 >= 0.8 -> rank >= 2.4
        assert!(!filter(&cell(2, 3)));
        assert!(filter(&cell(3, 4)));
    }

    #[test]
    fn test_needs_refetch() {
        let mut s = state("word", "tag");
        assert!(needs_refetch(&s));
        s.server_min_freq = Some(5);
        assert!(!needs_refetch(&s));
        s.min_freq = "3".to_string();
        assert!(needs_refetch(&s));
        s.min_freq_type = FreqFilterQuantity::AbsPercentile;
        s.min_freq = "10".to_string();
        assert!(!needs_refetch(&s));
        s.min_freq_type = FreqFilterQuantity::Ipm;
        assert!(needs_refetch(&s));
        s.server_min_freq = Some(1);
        assert!(!needs_refetch(&s));
    }

    #[test]
    fn test_assign_orig_orders_shares_ties() {
        let rows = vec![
            RawFreqRow("a".into(), "x".into(), 10, 100),
            RawFreqRow("a".into(), "y".into(), 3, 100),
            RawFreqRow("b".into(), "x".into(), 10, 100),
            RawFreqRow("b".into(), "y".into(), 7, 100),
        ];
        assert_eq!(assign_orig_orders(&rows), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_assign_orig_orders_ascending_response() {
        let rows: Vec<RawFreqRow> = [0, 1, 1, 4, 9, 9]
            .iter()
            .map(|&abs| RawFreqRow("a".into(), "x".into(), abs, 100))
            .collect();
        assert_eq!(assign_orig_orders(&rows), vec![0, 1, 1, 2, 3, 3]);
        assert!(assign_orig_orders(&[]).is_empty());
    }

    #[test]
    fn test_server_abs_floor_by_echoed_type() {
        let echo = |ctminfreq_type| CtFreqFormArgs {
            ctminfreq: Some(50),
            ctminfreq_type,
        };
        assert_eq!(server_abs_floor(&echo(Some(FreqFilterQuantity::Abs))), Some(50));
        assert_eq!(server_abs_floor(&echo(None)), Some(50));
        assert_eq!(server_abs_floor(&echo(Some(FreqFilterQuantity::AbsPercentile))), None);
        assert_eq!(server_abs_floor(&echo(Some(FreqFilterQuantity::Ipm))), None);
    }

    #[test]
    fn test_threshold_validation_by_type() {
        assert!(validate_threshold("0", FreqFilterQuantity::Abs));
        assert!(!validate_threshold("0", FreqFilterQuantity::IpmPercentile));
        assert!(validate_threshold("100", FreqFilterQuantity::AbsPercentile));
        assert!(!validate_threshold("07", FreqFilterQuantity::Ipm));
    }
}
