use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contract_review_common::config::SystemConfig;
use serde_json::Value;

use super::validation;

/// Complete engine configuration loaded from the config directory.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Parsed system.toml.
    pub system: SystemConfig,
    /// Tool schemas keyed by "{role}/{tool_name}" (e.g. "checklist_compliance/search_checklist").
    pub tool_schemas: HashMap<String, Value>,
    /// Role system prompts keyed by filename stem (e.g. "risk_scoring").
    pub prompts: HashMap<String, String>,
    /// Base config directory; relative paths in system.toml resolve against it.
    pub config_dir: PathBuf,
}

impl EngineConfig {
    /// Checklist guide location, if one is configured.
    pub fn checklist_path(&self) -> Option<PathBuf> {
        self.system
            .knowledge
            .checklist_path
            .as_ref()
            .map(|p| self.config_dir.join(p))
    }
}

/// Load all configuration from the given config directory.
///
/// Fails loudly with clear error messages if anything is misconfigured.
pub fn load_config(config_dir: &Path) -> Result<EngineConfig, ConfigError> {
    tracing::info!(config_dir = %config_dir.display(), "Loading configuration");

    let system = load_system_config(&config_dir.join("system.toml"))?;
    let tool_schemas = load_tool_schemas(&config_dir.join("tools"))?;
    let prompts = load_prompts(&config_dir.join("prompts"))?;

    let config = EngineConfig {
        system,
        tool_schemas,
        prompts,
        config_dir: config_dir.to_path_buf(),
    };

    validation::validate(&config)?;

    tracing::info!(
        tool_schemas = config.tool_schemas.len(),
        prompts = config.prompts.len(),
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::FileRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::FileRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        paths.push(entry.path());
    }
    // Directory order is platform dependent.
    paths.sort();
    Ok(paths)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

fn load_system_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    let content = read_file(path)?;

    SystemConfig::from_toml_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn load_tool_schemas(tools_dir: &Path) -> Result<HashMap<String, Value>, ConfigError> {
    let mut schemas = HashMap::new();

    if !tools_dir.exists() {
        tracing::warn!(
            path = %tools_dir.display(),
            "Tools directory does not exist, no tool schemas loaded"
        );
        return Ok(schemas);
    }

    // One directory per role (clause_extraction/, risk_scoring/, ...).
    for role_path in read_dir(tools_dir)? {
        if !role_path.is_dir() {
            continue;
        }
        let role_name = file_stem(&role_path);

        for file_path in read_dir(&role_path)? {
            if !file_path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }

            let content = read_file(&file_path)?;
            let schema: Value = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: file_path.clone(),
                detail: e.to_string(),
            })?;

            let key = format!("{}/{}", role_name, file_stem(&file_path));
            tracing::debug!(tool = %key, "Loaded tool schema");
            schemas.insert(key, schema);
        }
    }

    Ok(schemas)
}

fn load_prompts(prompts_dir: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut prompts = HashMap::new();

    if !prompts_dir.exists() {
        tracing::warn!(
            path = %prompts_dir.display(),
            "Prompts directory does not exist, no prompts loaded"
        );
        return Ok(prompts);
    }

    for path in read_dir(prompts_dir)? {
        if path
            .extension()
            .is_some_and(|ext| ext == "md" || ext == "txt")
        {
            let name = file_stem(&path);
            let content = read_file(&path)?;
            tracing::debug!(prompt = %name, "Loaded prompt template");
            prompts.insert(name, content);
        }
    }

    Ok(prompts)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for contract_review_common::ReviewError {
    fn from(e: ConfigError) -> Self {
        contract_review_common::ReviewError::Config(e.to_string())
    }
}
