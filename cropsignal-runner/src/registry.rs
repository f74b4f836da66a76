//! Commodity registry: which feature table and which model variants belong to
//! each traded commodity.
//!
//! ```toml
//! ledger_path = "signals/signal_history.csv"
//!
//! [commodities.corn]
//! display_name = "Corn"
//! data_path = "data/corn_combined_features.csv"
//!
//! [commodities.corn.variants.high_conviction]
//! model_dir = "models/corn_high_conviction"
//! artifact_suffix = "_2024"
//! ```
//!
//! Relative paths resolve against the registry's base directory. Without a
//! registry file the built-in production layout is used.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LEDGER_PATH: &str = "signals/signal_history.csv";
pub const CONFIG_FILE_NAME: &str = "model_config.json";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown commodity '{name}' (registered: {known})")]
    UnknownCommodity { name: String, known: String },

    #[error("commodity '{commodity}' has no variant '{variant}' (registered: {known})")]
    UnknownVariant {
        commodity: String,
        variant: String,
        known: String,
    },

    #[error("registry defines no commodities")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub model_dir: PathBuf,
    /// Defaults to `<model_dir>/model_config.json`.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    #[serde(default)]
    pub artifact_suffix: Option<String>,
}

impl VariantSpec {
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join(CONFIG_FILE_NAME))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommoditySpec {
    pub display_name: String,
    pub data_path: PathBuf,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    pub commodities: BTreeMap<String, CommoditySpec>,
}

/// One (commodity, variant) pipeline to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub commodity: String,
    pub display_name: String,
    pub data_path: PathBuf,
    pub variant: String,
    pub spec: VariantSpec,
}

fn join_names<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl Registry {
    pub fn from_toml_str(s: &str) -> Result<Self, RegistryError> {
        let registry: Registry = toml::from_str(s)?;
        if registry.commodities.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(registry)
    }

    /// Load a registry file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::from_toml_str(&text)?.rebased(base))
    }

    /// The production layout under `base`.
    pub fn default_layout(base: &Path) -> Self {
        fn variant(dir: &str, suffix: Option<&str>) -> VariantSpec {
            VariantSpec {
                model_dir: PathBuf::from("models").join(dir),
                config_path: None,
                artifact_suffix: suffix.map(str::to_string),
            }
        }

        let mut corn = BTreeMap::new();
        corn.insert("moderate".to_string(), variant("moderate", None));
        corn.insert("conservative".to_string(), variant("conservative_v2.0", None));
        corn.insert(
            "high_conviction".to_string(),
            variant("corn_high_conviction", Some("_2024")),
        );

        let mut soybean = BTreeMap::new();
        soybean.insert(
            "high_conviction".to_string(),
            variant("soy_high_conviction", Some("_2024")),
        );

        let mut commodities = BTreeMap::new();
        commodities.insert(
            "corn".to_string(),
            CommoditySpec {
                display_name: "Corn".into(),
                data_path: PathBuf::from("data/corn_combined_features.csv"),
                variants: corn,
            },
        );
        commodities.insert(
            "soybean".to_string(),
            CommoditySpec {
                display_name: "Soybeans".into(),
                data_path: PathBuf::from("data/soybean_combined_features.csv"),
                variants: soybean,
            },
        );

        Self {
            ledger_path: None,
            commodities,
        }
        .rebased(base)
    }

    fn rebased(mut self, base: &Path) -> Self {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(p) = self.ledger_path.as_mut() {
            rebase(p);
        }
        for spec in self.commodities.values_mut() {
            rebase(&mut spec.data_path);
            for v in spec.variants.values_mut() {
                rebase(&mut v.model_dir);
                if let Some(p) = v.config_path.as_mut() {
                    rebase(p);
                }
            }
        }
        if self.ledger_path.is_none() {
            self.ledger_path = Some(base.join(DEFAULT_LEDGER_PATH));
        }
        self
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH))
    }

    pub fn commodity_names(&self) -> impl Iterator<Item = &str> {
        self.commodities.keys().map(String::as_str)
    }

    pub fn commodity(&self, name: &str) -> Result<&CommoditySpec, RegistryError> {
        self.commodities
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCommodity {
                name: name.to_string(),
                known: join_names(self.commodities.keys()),
            })
    }

    /// Pipelines for a commodity selection.
    ///
    /// `commodity = None` selects every registered commodity; `variant = None`
    /// selects every variant registered for each commodity. A named variant
    /// must exist for every selected commodity.
    pub fn targets(
        &self,
        commodity: Option<&str>,
        variant: Option<&str>,
    ) -> Result<Vec<Target>, RegistryError> {
        let selected: Vec<(&String, &CommoditySpec)> = match commodity {
            Some(name) => {
                let entry = self.commodities.get_key_value(name).ok_or_else(|| {
                    RegistryError::UnknownCommodity {
                        name: name.to_string(),
                        known: join_names(self.commodities.keys()),
                    }
                })?;
                vec![entry]
            }
            None => self.commodities.iter().collect(),
        };

        let mut targets = Vec::new();
        for (name, spec) in selected {
            let variants: Vec<(&String, &VariantSpec)> = match variant {
                Some(v) => {
                    let entry = spec.variants.get_key_value(v).ok_or_else(|| {
                        RegistryError::UnknownVariant {
                            commodity: name.clone(),
                            variant: v.to_string(),
                            known: join_names(spec.variants.keys()),
                        }
                    })?;
                    vec![entry]
                }
                None => spec.variants.iter().collect(),
            };
            targets.extend(variants.into_iter().map(|(vname, vspec)| Target {
                commodity: name.clone(),
                display_name: spec.display_name.clone(),
                data_path: spec.data_path.clone(),
                variant: vname.clone(),
                spec: vspec.clone(),
            }));
        }
        Ok(targets)
    }
}
