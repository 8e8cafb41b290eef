//! Locating model files on disk or on the Hugging Face hub.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use hf_hub::{api::sync::Api, Repo, RepoType};
use sha2::{Digest, Sha256};

use crate::config_loader::ModelConfig;
use crate::errors::{FilterError, FilterResult};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Paths to the three files a classifier is built from.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub weights_path: PathBuf,
}

impl ModelFiles {
    /// Use files from a local directory.
    pub fn from_dir(dir: &Path) -> FilterResult<Self> {
        let files = Self {
            config_path: dir.join(CONFIG_FILE),
            tokenizer_path: dir.join(TOKENIZER_FILE),
            weights_path: dir.join(WEIGHTS_FILE),
        };

        for path in [&files.config_path, &files.tokenizer_path, &files.weights_path] {
            if !path.is_file() {
                return Err(FilterError::model_load(format!(
                    "Missing model file: {}",
                    path.display()
                )));
            }
        }
        Ok(files)
    }

    /// Download (or reuse from the local hub cache) a repo revision.
    /// Blocking; call before the server starts or from a blocking task.
    pub fn fetch(repo_id: &str, revision: &str) -> FilterResult<Self> {
        let api = Api::new()
            .map_err(|e| FilterError::model_load(format!("Failed to initialize hub API: {e}")))?;
        let repo = api.repo(Repo::with_revision(
            repo_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let get = |name: &str| {
            repo.get(name).map_err(|e| {
                FilterError::model_load(format!("Failed to download {name} from {repo_id}: {e}"))
            })
        };

        Ok(Self {
            config_path: get(CONFIG_FILE)?,
            tokenizer_path: get(TOKENIZER_FILE)?,
            weights_path: get(WEIGHTS_FILE)?,
        })
    }

    pub fn resolve(config: &ModelConfig) -> FilterResult<Self> {
        match &config.local_dir {
            Some(dir) => {
                tracing::info!("Loading model files from {}", dir.display());
                Self::from_dir(dir)
            }
            None => {
                tracing::info!(
                    "Fetching model files for {}@{}",
                    config.repo_id,
                    config.revision
                );
                Self::fetch(&config.repo_id, &config.revision)
            }
        }
    }
}

/// `sha256:<hex>` digest of a file, streamed so large weights stay off the heap.
pub fn fingerprint(path: &Path) -> FilterResult<String> {
    let mut file = File::open(path)
        .map_err(|e| FilterError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| FilterError::io(format!("reading {}", path.display()), e))?;
    Ok(format!("sha256:{:x}", hasher.finalize()))
}
