use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::json;

use ctfreq::action::{FreqAction, FreqEvent};
use ctfreq::config::{EngineSettings, Palette};
use ctfreq::core::types::{
    AlphaLevel, CtFreqFormArgs, CtFreqResponse, Dimension, FreqFilterQuantity, FreqQuantity,
    RawFreqRow, SortKey,
};
use ctfreq::core::FreqFormArgs;
use ctfreq::services::export::{ExportCell, ExportPayload};
use ctfreq::services::{
    fetch_and_load, ExportAdapter, Exportable, FreqModel, Freq2DFlatViewModel, Freq2DTableModel,
    JsonFileTransport, ManualScheduler, SaveFormat, SaveMode,
};

fn sample_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("sample-data")
        .join("ctfreq-response.json")
}

fn form(min_freq: &str) -> FreqFormArgs {
    FreqFormArgs {
        attr1: "word".to_string(),
        attr2: "tag".to_string(),
        ct_fcrit1: "0<0".to_string(),
        ct_fcrit2: "0<0".to_string(),
        min_freq: min_freq.to_string(),
        min_freq_type: FreqFilterQuantity::Abs,
        alpha_level: AlphaLevel::Level5,
        uses_adhoc_subcorpus: false,
    }
}

fn response(rows: &[(&str, &str, u64, u64)]) -> CtFreqResponse {
    CtFreqResponse {
        data: rows
            .iter()
            .map(|(a, b, abs, total)| RawFreqRow(a.to_string(), b.to_string(), *abs, *total))
            .collect(),
        full_size: rows.len() as u64,
        ctfreq_form_args: CtFreqFormArgs {
            ctminfreq: Some(1),
            ctminfreq_type: Some(FreqFilterQuantity::Abs),
        },
    }
}

fn table(min_freq: &str) -> Freq2DTableModel {
    Freq2DTableModel::new(
        form(min_freq),
        &EngineSettings::default(),
        Box::new(ManualScheduler::new()),
    )
}

fn list(min_freq: &str) -> Freq2DFlatViewModel {
    Freq2DFlatViewModel::new(
        form(min_freq),
        &EngineSettings::default(),
        Box::new(ManualScheduler::new()),
    )
}

fn load(model: &mut dyn FreqModel, resp: CtFreqResponse) {
    let event = model.update(FreqAction::DataLoaded(resp)).unwrap();
    assert!(matches!(event, Some(FreqEvent::DataImported { .. })));
}

#[test]
fn imported_cells_carry_abs_and_ipm() {
    let mut m = table("1");
    load(
        &mut m,
        response(&[("A", "X", 10, 100), ("A", "Y", 0, 100), ("B", "X", 5, 50)]),
    );

    let ax = m.cell("A", "X").expect("A/X present");
    assert_eq!(ax.abs, 10);
    assert_eq!(ax.ipm, 100000.0);
    assert!(m.cell("A", "Y").is_none());
    let bx = m.cell("B", "X").expect("B/X present");
    assert_eq!(bx.abs, 5);
    assert_eq!(bx.ipm, 100000.0);

    // the zero count still contributes its label
    let cols: Vec<&str> = m.d2_labels().iter().map(|l| l.value.as_str()).collect();
    assert_eq!(cols, vec!["X", "Y"]);
}

#[test]
fn linear_colors_order_with_values() {
    let mut m = table("1");
    load(&mut m, response(&[("A", "X", 10, 100), ("B", "X", 5, 50)]));
    m.update(FreqAction::SetDisplayQuantity(FreqQuantity::Abs))
        .unwrap();

    let palette = Palette::default();
    let bucket = |v1: &str| {
        let color = m.cell(v1, "X").and_then(|c| c.bg_color.clone()).unwrap();
        palette.iter().position(|p| *p == color).unwrap()
    };
    assert!(bucket("A") >= bucket("B"));
    assert_ne!(bucket("A"), bucket("B"));
}

#[test]
fn flat_and_matrix_agree_on_numbers() {
    let transport = JsonFileTransport::new(sample_path());
    let mut m = table("1");
    let mut l = list("1");
    let args = m.state().fetch_args();
    fetch_and_load(&mut m, &transport, &args).unwrap();
    fetch_and_load(&mut l, &transport, &args).unwrap();

    assert_eq!(l.orig_data().len(), 5);
    for item in l.orig_data() {
        let cell = &m.orig_data()[&item.val1][&item.val2];
        assert_eq!(cell.abs, item.cell.abs);
        assert_eq!(cell.ipm, item.cell.ipm);
        assert_eq!(cell.abs_conf_interval, item.cell.abs_conf_interval);
        assert_eq!(cell.ipm_conf_interval, item.cell.ipm_conf_interval);
        assert_eq!(cell.pfilter, item.cell.pfilter);
    }
}

#[test]
fn abs_percentile_accounts_for_missing_cells() {
    let transport = JsonFileTransport::new(sample_path());
    let mut l = list("1");
    let args = l.state().fetch_args();
    fetch_and_load(&mut l, &transport, &args).unwrap();

    let event = l
        .update(FreqAction::SetMinFreqType(FreqFilterQuantity::AbsPercentile))
        .unwrap();
    assert_eq!(event, None);
    l.update(FreqAction::SetMinFreq("60".to_string())).unwrap();

    // 5 ranked of 9 combinations, so rank / 9 + 4 / 9 >= 0.6 keeps the top three
    let mut kept: Vec<u64> = l.data().iter().map(|i| i.cell.abs).collect();
    kept.sort();
    assert_eq!(kept, vec![7, 12, 40]);
}

#[test]
fn export_mirrors_displayed_state() {
    let rows = [("a", "x", 10, 100), ("b", "x", 5, 100), ("b", "y", 8, 100), ("c", "y", 1, 100)];
    let mut m = table("2");
    let mut l = list("2");
    load(&mut m, response(&rows));
    load(&mut l, response(&rows));
    m.update(FreqAction::SetDisplayQuantity(FreqQuantity::Abs))
        .unwrap();
    m.update(FreqAction::SortLabels {
        dim: Dimension::First,
        key: SortKey::Abs,
    })
    .unwrap();

    let mut adapter = ExportAdapter::new(SaveMode::Table, SaveFormat::Xlsx);
    let ExportPayload::Table(payload) = adapter.export_data(&m, &l) else {
        panic!("expected a table payload");
    };
    assert_eq!(payload.saveformat, SaveFormat::Xlsx);
    assert_eq!(payload.quantity, FreqQuantity::Abs);
    assert_eq!(payload.row_labels, vec!["b", "a", "c"]);
    assert_eq!(payload.headings, vec!["x", "y"]);
    let values: Vec<Vec<Option<f64>>> = payload
        .data
        .iter()
        .map(|row| row.iter().map(|c| c.as_ref().map(|ExportCell(_, v, _, _)| *v)).collect())
        .collect();
    assert_eq!(
        values,
        vec![
            vec![Some(5.0), Some(8.0)],
            vec![Some(10.0), None],
            vec![None, None],
        ]
    );

    m.update(FreqAction::SetHideEmptyVectors(true)).unwrap();
    let ExportPayload::Table(payload) = m.export_data(SaveFormat::Csv) else {
        panic!("expected a table payload");
    };
    assert_eq!(payload.row_labels, vec!["b", "a"]);

    adapter.set_mode(SaveMode::List);
    let ExportPayload::List(payload) = adapter.export_data(&m, &l) else {
        panic!("expected a list payload");
    };
    assert_eq!(payload.headings.len(), 8);
    assert_eq!(payload.rows.len(), 3);
    assert_eq!(payload.rows[0][0], json!("a"));
    assert_eq!(payload.rows[0][2], json!(10));
}

#[test]
fn list_export_drops_ipm_for_structural_pair() {
    let mut f = form("1");
    f.attr1 = "doc.author".to_string();
    f.attr2 = "doc.year".to_string();
    let mut l = Freq2DFlatViewModel::new(f, &EngineSettings::default(), Box::new(ManualScheduler::new()));
    load(&mut l, response(&[("Smith", "1999", 3, 10)]));

    let ExportPayload::List(payload) = l.export_data(SaveFormat::Tsv) else {
        panic!("expected a list payload");
    };
    assert_eq!(
        payload.headings,
        vec!["doc.author", "doc.year", "abs", "abs conf. low", "abs conf. high"]
    );
    assert_eq!(payload.rows[0].len(), 5);
}

#[test]
fn transposing_twice_restores_table() {
    let transport = JsonFileTransport::new(sample_path());
    let mut m = table("2");
    let args = m.state().fetch_args();
    fetch_and_load(&mut m, &transport, &args).unwrap();
    let orig = m.orig_data().clone();
    let data = m.data().clone();

    m.update(FreqAction::TransposeTable).unwrap();
    assert_eq!(m.state().attr1, "tag");
    assert_eq!(m.cell("NN", "dog").map(|c| c.abs), Some(12));
    m.update(FreqAction::TransposeTable).unwrap();

    assert_eq!(m.state().attr1, "word");
    assert_eq!(m.orig_data(), &orig);
    assert_eq!(m.data(), &data);
}
