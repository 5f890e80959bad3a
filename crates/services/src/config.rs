//! Environment-driven configuration.

use std::env;
use std::time::Duration;

use learn_core::model::AssessmentSettings;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EVALUATOR_TIMEOUT_SECS: u64 = 30;

/// OpenAI-compatible endpoint shared by the evaluator and the tutor.
#[derive(Clone, Debug)]
pub struct AiEndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AiEndpointConfig {
    /// Read `LEARN_AI_API_KEY`, `LEARN_AI_BASE_URL` and `LEARN_AI_MODEL`.
    ///
    /// Returns `Ok(None)` when no API key is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the base URL does not parse.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`AiEndpointConfig::from_env`] over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the base URL does not parse.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = lookup("LEARN_AI_API_KEY").filter(|key| !key.trim().is_empty())
        else {
            return Ok(None);
        };
        let base_url = lookup("LEARN_AI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        if Url::parse(&base_url).is_err() {
            return Err(ConfigError::InvalidUrl {
                var: "LEARN_AI_BASE_URL",
                raw: base_url,
            });
        }
        let model = lookup("LEARN_AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());

        Ok(Some(Self {
            base_url,
            api_key: api_key.trim().to_string(),
            model,
        }))
    }
}

/// Everything the assessment engine reads from the environment.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub settings: AssessmentSettings,
    pub evaluator_timeout: Duration,
    pub ai: Option<AiEndpointConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings: AssessmentSettings::default(),
            evaluator_timeout: Duration::from_secs(DEFAULT_EVALUATOR_TIMEOUT_SECS),
            ai: None,
        }
    }
}

impl EngineConfig {
    /// Read engine knobs from `LEARN_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let pass_percent = number(&lookup, "LEARN_QUIZ_PASS_PERCENT")?
            .unwrap_or(AssessmentSettings::DEFAULT_PASS_PERCENT);
        let quiz_attempts = number(&lookup, "LEARN_QUIZ_MAX_ATTEMPTS")?
            .unwrap_or(AssessmentSettings::DEFAULT_MAX_ATTEMPTS);
        let exercise_attempts = number(&lookup, "LEARN_EXERCISE_MAX_ATTEMPTS")?
            .unwrap_or(AssessmentSettings::DEFAULT_MAX_ATTEMPTS);
        let hint_ms = number(&lookup, "LEARN_HINT_DISMISS_MS")?
            .unwrap_or(AssessmentSettings::DEFAULT_HINT_DISMISS_MS);
        let timeout_secs = number(&lookup, "LEARN_EVALUATOR_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_EVALUATOR_TIMEOUT_SECS);

        let settings = AssessmentSettings::new(
            pass_percent,
            quiz_attempts,
            exercise_attempts,
            hint_ms,
            AssessmentSettings::DEFAULT_HINT_EXCERPT_CHARS,
        )?;

        Ok(Self {
            settings,
            evaluator_timeout: Duration::from_secs(timeout_secs.max(1)),
            ai: AiEndpointConfig::from_lookup(&lookup)?,
        })
    }
}

fn number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { var, raw })
}
