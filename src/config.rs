use std::{env, path::PathBuf, time::Duration};

use derive_deref::{Deref, DerefMut};
use directories::ProjectDirs;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::core::base::FreqFormArgs;
use crate::core::types::{AlphaLevel, ColorMapping, FreqFilterQuantity};

const CONFIG: &str = include_str!("../.config/config.json5");

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

/// Heat map colors, lowest bucket first
#[derive(Clone, Debug, PartialEq, Eq, Deref, DerefMut, Serialize, Deserialize)]
pub struct Palette(pub Vec<String>);

impl Default for Palette {
    fn default() -> Self {
        Self(
            [
                "#fff7f3", "#fde0dd", "#fcc5c0", "#fa9fb5", "#f768a1", "#dd3497", "#ae017e",
                "#7a0177", "#49006a",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default = "default_color_mapping")]
    pub color_mapping: ColorMapping,
    #[serde(default)]
    pub hide_empty_vectors: bool,
}

fn default_debounce_ms() -> u64 {
    400
}

fn default_color_mapping() -> ColorMapping {
    ColorMapping::Linear
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            palette: Palette::default(),
            color_mapping: default_color_mapping(),
            hide_empty_vectors: false,
        }
    }
}

impl EngineSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDefaults {
    pub min_freq: String,
    pub min_freq_type: FreqFilterQuantity,
    pub alpha_level: AlphaLevel,
    pub ct_fcrit1: String,
    pub ct_fcrit2: String,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            min_freq: "5".to_string(),
            min_freq_type: FreqFilterQuantity::Abs,
            alpha_level: AlphaLevel::Level5,
            ct_fcrit1: "0<0".to_string(),
            ct_fcrit2: "0<0".to_string(),
        }
    }
}

impl FormDefaults {
    pub fn form_args(&self, attr1: &str, attr2: &str) -> FreqFormArgs {
        FreqFormArgs {
            attr1: attr1.to_string(),
            attr2: attr2.to_string(),
            ct_fcrit1: self.ct_fcrit1.clone(),
            ct_fcrit2: self.ct_fcrit2.clone(),
            min_freq: self.min_freq.clone(),
            min_freq_type: self.min_freq_type,
            alpha_level: self.alpha_level,
            uses_adhoc_subcorpus: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub defaults: FormDefaults,
}

impl Config {
    /// Embedded defaults, then the user file, then `CTFREQ_*` environment overrides
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        let selected_path = match config_path {
            Some(p) => Some(p.clone()),
            None => {
                let home_cfg = get_config_dir().join("config.json5");
                home_cfg.exists().then_some(home_cfg)
            }
        };
        if let Some(path) = selected_path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json5)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&PROJECT_NAME)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "ctfreq", env!("CARGO_PKG_NAME"))
}
