use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::Display;

use crate::core::stats::{calc_ipm, round_float, wilson_conf_interval};
use crate::error::CtFreqError;

/// Minimum frequency filter type applied to the cells of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum FreqFilterQuantity {
    #[strum(serialize = "abs")]
    #[serde(rename = "abs")]
    Abs,
    #[strum(serialize = "pabs")]
    #[serde(rename = "pabs")]
    AbsPercentile,
    #[strum(serialize = "ipm")]
    #[serde(rename = "ipm")]
    Ipm,
    #[strum(serialize = "pipm")]
    #[serde(rename = "pipm")]
    IpmPercentile,
}

impl FreqFilterQuantity {
    /// The cell quantity the filter compares or ranks by
    pub fn quantity(&self) -> FreqQuantity {
        match self {
            Self::Abs | Self::AbsPercentile => FreqQuantity::Abs,
            Self::Ipm | Self::IpmPercentile => FreqQuantity::Ipm,
        }
    }

    pub fn is_percentile(&self) -> bool {
        matches!(self, Self::AbsPercentile | Self::IpmPercentile)
    }
}

impl FromStr for FreqFilterQuantity {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abs" => Ok(Self::Abs),
            "pabs" => Ok(Self::AbsPercentile),
            "ipm" => Ok(Self::Ipm),
            "pipm" => Ok(Self::IpmPercentile),
            _ => Err(CtFreqError::UnknownFilterType(s.to_string())),
        }
    }
}

/// Quantity displayed, colored and exported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FreqQuantity {
    Abs,
    Ipm,
}

impl FromStr for FreqQuantity {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abs" => Ok(Self::Abs),
            "ipm" => Ok(Self::Ipm),
            _ => Err(CtFreqError::UnknownQuantity(s.to_string())),
        }
    }
}

/// Significance level of the confidence intervals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum AlphaLevel {
    #[strum(serialize = "0.1")]
    #[serde(rename = "0.1")]
    Level10,
    #[default]
    #[strum(serialize = "0.05")]
    #[serde(rename = "0.05")]
    Level5,
    #[strum(serialize = "0.01")]
    #[serde(rename = "0.01")]
    Level1,
    #[strum(serialize = "0.001")]
    #[serde(rename = "0.001")]
    Level01,
}

impl AlphaLevel {
    pub const ALL: [AlphaLevel; 4] = [Self::Level10, Self::Level5, Self::Level1, Self::Level01];

    /// Two-sided standard normal quantile `z(1 - alpha/2)`
    pub fn z_score(&self) -> f64 {
        match self {
            Self::Level10 => 1.6448536269514722,
            Self::Level5 => 1.959963984540054,
            Self::Level1 => 2.5758293035489004,
            Self::Level01 => 3.2905267314918945,
        }
    }
}

impl FromStr for AlphaLevel {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.1" => Ok(Self::Level10),
            "0.05" => Ok(Self::Level5),
            "0.01" => Ok(Self::Level1),
            "0.001" => Ok(Self::Level01),
            _ => Err(CtFreqError::UnknownAlphaLevel(s.to_string())),
        }
    }
}

/// Heat map bucket assignment strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColorMapping {
    Linear,
    Percentile,
}

impl FromStr for ColorMapping {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "percentile" => Ok(Self::Percentile),
            _ => Err(CtFreqError::UnknownColorMapping(s.to_string())),
        }
    }
}

/// Sort key for a matrix axis or for the flat list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortKey {
    /// Attribute value, lexicographic
    Attr,
    Abs,
    Ipm,
}

impl SortKey {
    /// Quantity summed or compared by the key, `None` for attribute values
    pub fn quantity(&self) -> Option<FreqQuantity> {
        match self {
            Self::Attr => None,
            Self::Abs => Some(FreqQuantity::Abs),
            Self::Ipm => Some(FreqQuantity::Ipm),
        }
    }
}

impl FromStr for SortKey {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attr" => Ok(Self::Attr),
            "abs" => Ok(Self::Abs),
            "ipm" => Ok(Self::Ipm),
            _ => Err(CtFreqError::UnknownSortKey(s.to_string())),
        }
    }
}

/// Matrix axis: rows are the first attribute, columns the second one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Dimension {
    First,
    Second,
}

/// Atomic unit of both table views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtFreqCell {
    pub orig_order: usize,
    pub abs: u64,
    pub abs_conf_interval: (f64, f64),
    pub ipm: f64,
    pub ipm_conf_interval: (f64, f64),
    pub domain_size: u64,
    pub bg_color: Option<String>,
    pub pfilter: String,
}

impl CtFreqCell {
    pub fn new(
        orig_order: usize,
        abs: u64,
        domain_size: u64,
        alpha: AlphaLevel,
        pfilter: String,
    ) -> Self {
        let (abs_conf_interval, ipm_conf_interval) = conf_intervals(abs, domain_size, alpha);
        Self {
            orig_order,
            abs,
            abs_conf_interval,
            ipm: calc_ipm(abs, domain_size),
            ipm_conf_interval,
            domain_size,
            bg_color: None,
            pfilter,
        }
    }

    /// Copy of the cell with intervals recomputed for another alpha level
    pub fn with_alpha(&self, alpha: AlphaLevel) -> Self {
        let (abs_conf_interval, ipm_conf_interval) =
            conf_intervals(self.abs, self.domain_size, alpha);
        Self {
            abs_conf_interval,
            ipm_conf_interval,
            ..self.clone()
        }
    }

    pub fn value_of(&self, quantity: FreqQuantity) -> f64 {
        match quantity {
            FreqQuantity::Abs => self.abs as f64,
            FreqQuantity::Ipm => self.ipm,
        }
    }

    pub fn interval_of(&self, quantity: FreqQuantity) -> (f64, f64) {
        match quantity {
            FreqQuantity::Abs => self.abs_conf_interval,
            FreqQuantity::Ipm => self.ipm_conf_interval,
        }
    }
}

fn conf_intervals(abs: u64, domain_size: u64, alpha: AlphaLevel) -> ((f64, f64), (f64, f64)) {
    let (low, high) = wilson_conf_interval(abs, domain_size, alpha);
    let total = domain_size as f64;
    (
        (round_float(low * total), round_float(high * total)),
        (round_float(low * 1e6), round_float(high * 1e6)),
    )
}

/// A cell of the flat list view together with both attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreqDataItem {
    pub val1: String,
    pub val2: String,
    #[serde(flatten)]
    pub cell: CtFreqCell,
}

/// Row label -> column label -> cell. A missing entry means zero or filtered out.
pub type Data2DTable = BTreeMap<String, BTreeMap<String, CtFreqCell>>;

/// A row or column label; hidden labels are retained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisLabel {
    pub value: String,
    pub visible: bool,
    /// First-seen position within the server response
    pub order: usize,
}

/// Raw server tuple `[label1, label2, absFreq, total]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFreqRow(pub String, pub String, pub u64, pub u64);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtFreqFormArgs {
    /// Absolute frequency floor the server applied
    #[serde(default, deserialize_with = "lenient_u64")]
    pub ctminfreq: Option<u64>,
    #[serde(default)]
    pub ctminfreq_type: Option<FreqFilterQuantity>,
}

/// Server response of a two-dimensional frequency query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtFreqResponse {
    pub data: Vec<RawFreqRow>,
    /// Number of all attribute value combinations, including the ones never sent
    pub full_size: u64,
    #[serde(default)]
    pub ctfreq_form_args: CtFreqFormArgs,
}

/// Form values echoed back as either numbers or strings
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FormValue {
        Num(u64),
        Text(String),
    }
    match Option::<FormValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FormValue::Num(n)) => Ok(Some(n)),
        Some(FormValue::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(FormValue::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Arguments of a refetch request handed to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchArgs {
    pub ctattr1: String,
    pub ctattr2: String,
    pub ctfcrit1: String,
    pub ctfcrit2: String,
    pub ctminfreq: String,
    pub ctminfreq_type: FreqFilterQuantity,
    pub alpha_level: AlphaLevel,
}

/// Summary of the currently displayed table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub size: usize,
    pub num_non_zero: usize,
    pub total_abs: u64,
}

/// Input item of the confidence interval chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartItem {
    /// `[low, point, high]`
    pub data: [f64; 3],
    pub label: String,
}
