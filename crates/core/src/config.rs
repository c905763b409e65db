use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::DEFAULT_CONFIDENCE_THRESHOLD;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub knowledge: KnowledgeConfig,
    pub model: ModelConfig,
    pub responses: ResponsesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub path: PathBuf,
    pub preload: bool,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub confidence_threshold: f64,
}

#[derive(Clone, Debug)]
pub struct ResponsesConfig {
    pub seed: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub knowledge_path: Option<PathBuf>,
    pub knowledge_preload: Option<bool>,
    pub model_path: Option<PathBuf>,
    pub confidence_threshold: Option<f64>,
    pub response_seed: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            knowledge: KnowledgeConfig { path: PathBuf::from("DB/data.json"), preload: false },
            model: ModelConfig {
                path: PathBuf::from("DB/model.json"),
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            },
            responses: ResponsesConfig { seed: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("arthur.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(knowledge) = patch.knowledge {
            if let Some(path) = knowledge.path {
                self.knowledge.path = path;
            }
            if let Some(preload) = knowledge.preload {
                self.knowledge.preload = preload;
            }
        }

        if let Some(model) = patch.model {
            if let Some(path) = model.path {
                self.model.path = path;
            }
            if let Some(confidence_threshold) = model.confidence_threshold {
                self.model.confidence_threshold = confidence_threshold;
            }
        }

        if let Some(responses) = patch.responses {
            if let Some(seed) = responses.seed {
                self.responses.seed = Some(seed);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ARTHUR_KNOWLEDGE_PATH") {
            self.knowledge.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("ARTHUR_KNOWLEDGE_PRELOAD") {
            self.knowledge.preload = parse_bool("ARTHUR_KNOWLEDGE_PRELOAD", &value)?;
        }

        if let Some(value) = read_env("ARTHUR_MODEL_PATH") {
            self.model.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("ARTHUR_MODEL_CONFIDENCE_THRESHOLD") {
            self.model.confidence_threshold =
                parse_f64("ARTHUR_MODEL_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("ARTHUR_RESPONSES_SEED") {
            self.responses.seed = Some(parse_u64("ARTHUR_RESPONSES_SEED", &value)?);
        }

        let log_level = read_env("ARTHUR_LOGGING_LEVEL").or_else(|| read_env("ARTHUR_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ARTHUR_LOGGING_FORMAT").or_else(|| read_env("ARTHUR_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.knowledge_path {
            self.knowledge.path = path;
        }
        if let Some(preload) = overrides.knowledge_preload {
            self.knowledge.preload = preload;
        }
        if let Some(path) = overrides.model_path {
            self.model.path = path;
        }
        if let Some(confidence_threshold) = overrides.confidence_threshold {
            self.model.confidence_threshold = confidence_threshold;
        }
        if let Some(seed) = overrides.response_seed {
            self.responses.seed = Some(seed);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_knowledge(&self.knowledge)?;
        validate_model(&self.model)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("arthur.toml"), PathBuf::from("config/arthur.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("knowledge.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_model(model: &ModelConfig) -> Result<(), ConfigError> {
    if model.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("model.path must not be empty".to_string()));
    }

    if !(0.0..=1.0).contains(&model.confidence_threshold) {
        return Err(ConfigError::Validation(
            "model.confidence_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    knowledge: Option<KnowledgePatch>,
    model: Option<ModelPatch>,
    responses: Option<ResponsesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    path: Option<PathBuf>,
    preload: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelPatch {
    path: Option<PathBuf>,
    confidence_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesPatch {
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
