use clap::{Parser, ValueEnum};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use ctfreq::action::{FreqAction, FreqEvent};
use ctfreq::config::Config;
use ctfreq::core::types::{
    AlphaLevel, ColorMapping, Dimension, FreqFilterQuantity, FreqQuantity, SortKey,
};
use ctfreq::services::{
    fetch_and_load, ExportAdapter, FreqModel, Freq2DFlatViewModel, Freq2DTableModel,
    JsonFileTransport, ManualScheduler, SaveFormat, SaveMode,
};

/// Render a saved two-dimensional frequency response as an export payload
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server response JSON (`data`, `full_size`, `ctfreq_form_args`)
    #[arg(value_name = "RESPONSE")]
    input: PathBuf,
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Log file, defaults to ctfreq.log in the working directory
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, default_value = "word")]
    attr1: String,
    #[arg(long, default_value = "tag")]
    attr2: String,
    /// Frequency threshold, an integer or a percentile 1..100
    #[arg(long = "min-freq")]
    min_freq: Option<String>,
    /// abs | pabs | ipm | pipm
    #[arg(long = "min-freq-type")]
    min_freq_type: Option<FreqFilterQuantity>,
    /// 0.1 | 0.05 | 0.01 | 0.001
    #[arg(long = "alpha")]
    alpha: Option<AlphaLevel>,
    /// The data come from an ad-hoc subcorpus
    #[arg(long)]
    adhoc: bool,
    /// table | list
    #[arg(long, default_value = "table")]
    view: SaveMode,
    /// csv | tsv | xlsx | xml
    #[arg(long, default_value = "csv")]
    format: SaveFormat,
    /// attr | abs | ipm
    #[arg(long = "sort-dim1")]
    sort_dim1: Option<SortKey>,
    #[arg(long = "sort-dim2")]
    sort_dim2: Option<SortKey>,
    #[arg(long = "flat-sort")]
    flat_sort: Option<SortKey>,
    #[arg(long)]
    reversed: bool,
    /// linear | percentile
    #[arg(long = "color-mapping")]
    color_mapping: Option<ColorMapping>,
    #[arg(long = "hide-empty")]
    hide_empty: bool,
    #[arg(long)]
    transpose: bool,
    /// abs | ipm
    #[arg(long)]
    quantity: Option<FreqQuantity>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn dispatch(model: &mut dyn FreqModel, action: FreqAction) -> Result<()> {
    debug!("dispatching {}", action);
    match model.update(action)? {
        Some(FreqEvent::FetchScheduled) => {
            warn!("threshold needs data missing from the response; showing what is loaded");
        }
        Some(FreqEvent::MinFreqRejected { value }) => {
            warn!("ignoring invalid min. freq. {:?}", value);
        }
        Some(event) => debug!("event {:?}", event),
        None => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    ctfreq::logging::init_with(args.log_file.clone(), args.logging.map(Into::into))?;

    let config = Config::from_path(args.config.as_ref())?;
    let mut form = config.defaults.form_args(&args.attr1, &args.attr2);
    form.uses_adhoc_subcorpus = args.adhoc;
    if let Some(alpha) = args.alpha {
        form.alpha_level = alpha;
    }

    let transport = JsonFileTransport::new(args.input.clone());
    let mut table =
        Freq2DTableModel::new(form.clone(), &config.engine, Box::new(ManualScheduler::new()));
    let mut list = Freq2DFlatViewModel::new(form, &config.engine, Box::new(ManualScheduler::new()));

    for model in [&mut table as &mut dyn FreqModel, &mut list as &mut dyn FreqModel] {
        let fetch_args = model.state().fetch_args();
        fetch_and_load(&mut *model, &transport, &fetch_args)?;
        if let Some(min_freq_type) = args.min_freq_type {
            dispatch(model, FreqAction::SetMinFreqType(min_freq_type))?;
        }
        if let Some(min_freq) = &args.min_freq {
            dispatch(model, FreqAction::SetMinFreq(min_freq.clone()))?;
        }
    }

    if args.transpose {
        dispatch(&mut table, FreqAction::TransposeTable)?;
    }
    if let Some(quantity) = args.quantity {
        dispatch(&mut table, FreqAction::SetDisplayQuantity(quantity))?;
    }
    if let Some(mapping) = args.color_mapping {
        dispatch(&mut table, FreqAction::SetColorMapping(mapping))?;
    }
    if args.hide_empty {
        dispatch(&mut table, FreqAction::SetHideEmptyVectors(true))?;
    }
    for (dim, key) in [(Dimension::First, args.sort_dim1), (Dimension::Second, args.sort_dim2)] {
        if let Some(key) = key {
            dispatch(&mut table, FreqAction::SortLabels { dim, key })?;
        }
    }
    if args.flat_sort.is_some() || args.reversed {
        let key = args.flat_sort.unwrap_or(list.sort_by());
        dispatch(&mut list, FreqAction::SortFlatList { key, reversed: args.reversed })?;
    }

    info!("table {:?}, list of {} items", table.table_info(), list.data().len());
    let adapter = ExportAdapter::new(args.view, args.format);
    let payload = adapter.export_data(&table, &list);
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
