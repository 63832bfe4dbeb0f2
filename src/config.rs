//! Run configuration and artifact layout
//!
//! A [`PipelineConfig`] can be built in code, loaded from a JSON file, or
//! assembled from the environment by [`PipelineConfig::from_env`]:
//!
//! | variable       | effect                                      |
//! |----------------|---------------------------------------------|
//! | `KGE_CONFIG`   | JSON file loaded first                      |
//! | `KGE_DATA_DIR` | artifact directory (relative to the cwd)    |
//! | `KGE_DIM`      | embedding dimension                         |
//! | `KGE_EPOCHS`   | training epochs                             |
//! | `KGE_WORKERS`  | worker threads (0 = one per core)           |
//! | `KGE_SEED`     | random seed                                 |

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::eval::EvalConfig;
use crate::graph::SplitConfig;
use crate::pcra::PcraConfig;
use crate::trainer::TrainingConfig;

/// Held-out partition of the triples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Valid,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Valid, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File names of every artifact inside one data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity2id(&self) -> PathBuf {
        self.root.join("entity2id.txt")
    }

    pub fn relation2id(&self) -> PathBuf {
        self.root.join("relation2id.txt")
    }

    /// `train.txt`, `valid.txt` or `test.txt`
    pub fn triples(&self, split: Split) -> PathBuf {
        self.root.join(format!("{}.txt", split))
    }

    pub fn path2(&self) -> PathBuf {
        self.root.join("path2.txt")
    }

    pub fn confidence(&self) -> PathBuf {
        self.root.join("confidence.txt")
    }

    /// `<split>_pra.txt`
    pub fn path_records(&self, split: Split) -> PathBuf {
        self.root.join(format!("{}_pra.txt", split))
    }

    pub fn entity2vec(&self) -> PathBuf {
        self.root.join("entity2vec.txt")
    }

    pub fn relation2vec(&self) -> PathBuf {
        self.root.join("relation2vec.txt")
    }

    pub fn metrics(&self) -> PathBuf {
        self.root.join("metrics.json")
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("data/kb2e")
    }
}

/// Settings for every stage of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub split: SplitConfig,
    pub pcra: PcraConfig,
    pub training: TrainingConfig,
    pub eval: EvalConfig,
}

impl PipelineConfig {
    /// Defaults rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// `KGE_CONFIG` (if set) overlaid with the individual `KGE_*` variables
    pub fn from_env() -> Result<Self> {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let mut config = match env::var("KGE_CONFIG") {
            Ok(path) => Self::load(&resolve(&current_dir, &path))?,
            Err(_) => Self::default(),
        };

        if let Ok(dir) = env::var("KGE_DATA_DIR") {
            config.data_dir = resolve(&current_dir, &dir);
        } else if config.data_dir.as_os_str().is_empty() {
            config.data_dir = current_dir.join(DataLayout::default().root());
        }

        if let Some(dim) = env_parse("KGE_DIM")? {
            config.training.dim = dim;
        }
        if let Some(epochs) = env_parse("KGE_EPOCHS")? {
            config.training.epochs = epochs;
        }
        if let Some(workers) = env_parse("KGE_WORKERS")? {
            config.training.workers = workers;
        }
        if let Some(seed) = env_parse::<u64>("KGE_SEED")? {
            config.training.seed = seed;
            config.split.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_dir)
    }

    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        self.pcra.validate()?;
        self.training.validate()?;
        self.eval.validate()
    }
}

fn resolve(current_dir: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        current_dir.join(path)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", name, value))),
        Err(_) => Ok(None),
    }
}
