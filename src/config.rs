//! Retrieval configuration, loaded from an optional TOML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration for the retrieval engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    /// Base URL used to build `?curid=` links for numeric page ids
    #[serde(default)]
    pub site_base_url: Option<String>,
}

/// Ranking parameters for the two search phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Final result count per phase (K)
    pub final_result_count: usize,
    /// Shard-local top-N cap for the preliminary body scan
    pub per_shard_limit: usize,
    /// Collapse chunk hits into one result per source document
    pub group_by_document: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            final_result_count: 5,
            per_shard_limit: 10,
            group_by_document: true,
        }
    }
}

/// Chunk merging and size-limiting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Shortest suffix/prefix match accepted as a chunk overlap
    pub min_overlap: usize,
    /// Longest overlap window checked
    pub max_overlap: usize,
    /// Character budget for one document's content
    pub document_size_limit: usize,
    /// Window size for representative-chunk context extraction
    pub context_size: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_overlap: 10,
            max_overlap: 300,
            document_size_limit: 10_000,
            context_size: 5_000,
        }
    }
}

/// Markup cleanup and redirect handling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizeConfig {
    /// Markers that identify a redirect stub at the start of a page
    pub redirect_markers: Vec<String>,
    /// Section headings truncated from the heading to the next heading
    pub truncated_sections: Vec<String>,
    /// Redirect chains longer than this resolve to the placeholder
    pub max_redirect_depth: usize,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            redirect_markers: vec!["#REDIRECT".to_string(), "#転送".to_string()],
            truncated_sections: vec![
                "references".to_string(),
                "see also".to_string(),
                "external links".to_string(),
                "sources".to_string(),
                "関連項目".to_string(),
                "出典".to_string(),
                "参考文献".to_string(),
                "外部リンク".to_string(),
            ],
            max_redirect_depth: 4,
        }
    }
}

impl RetrievalConfig {
    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = RetrievalConfig::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read config file")?;

        let config: RetrievalConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".wikirag").join("config.toml"))
    }
}
