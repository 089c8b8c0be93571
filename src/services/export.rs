//! Export payloads for the server side format conversion.
//!
//! The payload always mirrors what is currently displayed: visible labels in
//! their sorted order, filtered cells, current alpha level and colors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use strum::Display;

use crate::core::base::can_provide_ipm;
use crate::core::types::{AlphaLevel, Dimension, FreqFilterQuantity, FreqQuantity};
use crate::error::CtFreqError;
use crate::services::flat::Freq2DFlatViewModel;
use crate::services::matrix::Freq2DTableModel;

/// Which view gets exported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaveMode {
    #[default]
    Table,
    List,
}

impl FromStr for SaveMode {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "list" => Ok(Self::List),
            _ => Err(CtFreqError::UnknownSaveMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Csv,
    Tsv,
    Xlsx,
    Xml,
}

impl FromStr for SaveFormat {
    type Err = CtFreqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "xlsx" => Ok(Self::Xlsx),
            "xml" => Ok(Self::Xml),
            _ => Err(CtFreqError::UnknownSaveFormat(s.to_string())),
        }
    }
}

/// `[lowCI, value, highCI, color]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCell(pub f64, pub f64, pub f64, pub Option<String>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExportPayload {
    pub saveformat: SaveFormat,
    pub attr1: String,
    pub attr2: String,
    pub min_freq: String,
    pub min_freq_type: FreqFilterQuantity,
    pub alpha_level: AlphaLevel,
    pub quantity: FreqQuantity,
    /// Visible column labels
    pub headings: Vec<String>,
    /// Visible row labels, aligned with `data`
    pub row_labels: Vec<String>,
    pub data: Vec<Vec<Option<ExportCell>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListExportPayload {
    pub saveformat: SaveFormat,
    pub min_freq: String,
    pub min_freq_type: FreqFilterQuantity,
    pub alpha_level: AlphaLevel,
    pub headings: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExportPayload {
    Table(TableExportPayload),
    List(ListExportPayload),
}

pub trait Exportable {
    fn export_data(&self, format: SaveFormat) -> ExportPayload;
}

impl Exportable for Freq2DTableModel {
    fn export_data(&self, format: SaveFormat) -> ExportPayload {
        let state = self.state();
        let quantity = self.display_quantity();
        let cols: Vec<String> = self
            .visible_labels(Dimension::Second)
            .map(|l| l.value.clone())
            .collect();
        let rows: Vec<String> = self
            .visible_labels(Dimension::First)
            .map(|l| l.value.clone())
            .collect();
        let data = rows
            .iter()
            .map(|v1| {
                cols.iter()
                    .map(|v2| {
                        self.cell(v1, v2).map(|cell| {
                            let (low, high) = cell.interval_of(quantity);
                            ExportCell(low, cell.value_of(quantity), high, cell.bg_color.clone())
                        })
                    })
                    .collect()
            })
            .collect();
        ExportPayload::Table(TableExportPayload {
            saveformat: format,
            attr1: state.attr1.clone(),
            attr2: state.attr2.clone(),
            min_freq: state.min_freq.clone(),
            min_freq_type: state.min_freq_type,
            alpha_level: state.alpha_level,
            quantity,
            headings: cols,
            row_labels: rows,
            data,
        })
    }
}

impl Exportable for Freq2DFlatViewModel {
    fn export_data(&self, format: SaveFormat) -> ExportPayload {
        let state = self.state();
        let with_ipm = can_provide_ipm(state);
        let mut headings = vec![
            state.attr1.clone(),
            state.attr2.clone(),
            "abs".to_string(),
            "abs conf. low".to_string(),
            "abs conf. high".to_string(),
        ];
        if with_ipm {
            headings.extend(["ipm", "ipm conf. low", "ipm conf. high"].map(String::from));
        }
        let rows = self
            .data()
            .iter()
            .map(|item| {
                let c = &item.cell;
                let mut row = vec![
                    json!(item.val1),
                    json!(item.val2),
                    json!(c.abs),
                    json!(c.abs_conf_interval.0),
                    json!(c.abs_conf_interval.1),
                ];
                if with_ipm {
                    row.extend([
                        json!(c.ipm),
                        json!(c.ipm_conf_interval.0),
                        json!(c.ipm_conf_interval.1),
                    ]);
                }
                row
            })
            .collect();
        ExportPayload::List(ListExportPayload {
            saveformat: format,
            min_freq: state.min_freq.clone(),
            min_freq_type: state.min_freq_type,
            alpha_level: state.alpha_level,
            headings,
            rows,
        })
    }
}

/// Explicit two-state save mode selecting which view owns the export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportAdapter {
    pub mode: SaveMode,
    pub format: SaveFormat,
}

impl ExportAdapter {
    pub fn new(mode: SaveMode, format: SaveFormat) -> Self {
        Self { mode, format }
    }

    pub fn set_mode(&mut self, mode: SaveMode) {
        self.mode = mode;
    }

    pub fn export_data(
        &self,
        table: &Freq2DTableModel,
        list: &Freq2DFlatViewModel,
    ) -> ExportPayload {
        match self.mode {
            SaveMode::Table => table.export_data(self.format),
            SaveMode::List => list.export_data(self.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_mode_and_format_parsing() {
        assert_eq!(SaveMode::from_str("list").unwrap(), SaveMode::List);
        assert!(SaveMode::from_str("grid").is_err());
        assert_eq!(SaveFormat::from_str("xlsx").unwrap(), SaveFormat::Xlsx);
        assert_eq!(SaveFormat::Tsv.to_string(), "tsv");
    }

    #[test]
    fn test_export_cell_serializes_as_tuple() {
        let cell = ExportCell(1.5, 2.0, 3.25, Some("#fff7f3".to_string()));
        assert_eq!(
            serde_json::to_string(&cell).unwrap(),
            r##"[1.5,2.0,3.25,"#fff7f3"]"##
        );
    }
}
