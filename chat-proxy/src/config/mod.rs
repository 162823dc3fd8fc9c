use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_env_parsed, Environment};
use service_core::error::AppError;
use validator::Validate;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a clinical documentation assistant. \
Answer concisely and factually. You do not diagnose or prescribe; advise the user to \
consult a licensed clinician for medical decisions. Never ask for or repeat personal \
identifiers such as social security numbers, record numbers or email addresses.";

#[derive(Debug, Clone)]
pub struct ChatProxyConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub azure_openai: AzureOpenAiConfig,
    pub limits: LimitsConfig,
    pub cors: CorsConfig,
    pub system_prompt: String,
}

/// Hosted chat completion endpoint. Empty values leave the provider
/// unconfigured; chat requests then fail with a configuration error.
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    pub endpoint: String,
    pub api_key: Secret<String>,
    pub deployment: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Validate)]
pub struct LimitsConfig {
    #[validate(range(min = 1))]
    pub rate_limit_window_ms: u64,
    #[validate(range(min = 1))]
    pub rate_limit_max_requests: u32,
    #[validate(range(min = 1, max = 100))]
    pub max_messages: usize,
    #[validate(range(min = 1, max = 100000))]
    pub max_message_length: usize,
    #[validate(range(min = 1))]
    pub max_tokens: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 30,
            max_messages: 10,
            max_message_length: 4000,
            max_tokens: 1000,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct CorsConfig {
    #[validate(length(min = 1))]
    pub allowed_origins: Vec<String>,
}

impl ChatProxyConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = Environment::current()?;
        let is_prod = environment.is_prod();

        let limits = LimitsConfig {
            rate_limit_window_ms: get_env_parsed("RATE_LIMIT_WINDOW_MS", Some("60000"), is_prod)?,
            rate_limit_max_requests: get_env_parsed("RATE_LIMIT_MAX_REQUESTS", Some("30"), is_prod)?,
            max_messages: get_env_parsed("MAX_MESSAGES", Some("10"), is_prod)?,
            max_message_length: get_env_parsed("MAX_MESSAGE_LENGTH", Some("4000"), is_prod)?,
            max_tokens: get_env_parsed("MAX_TOKENS", Some("1000"), is_prod)?,
        };

        let cors = CorsConfig {
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        };

        let config = ChatProxyConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("chat-proxy"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: std::env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            azure_openai: AzureOpenAiConfig {
                endpoint: get_env("AZURE_OPENAI_ENDPOINT", Some(""), is_prod)?,
                api_key: Secret::new(get_env("AZURE_OPENAI_API_KEY", Some(""), is_prod)?),
                deployment: get_env("AZURE_OPENAI_DEPLOYMENT", Some(""), is_prod)?,
                api_version: get_env("AZURE_OPENAI_API_VERSION", Some("2024-02-01"), is_prod)?,
                timeout_secs: get_env_parsed("AZURE_OPENAI_TIMEOUT_SECS", Some("30"), is_prod)?,
            },
            limits,
            cors,
            system_prompt: get_env("SYSTEM_PROMPT", Some(DEFAULT_SYSTEM_PROMPT), false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Semantic checks on values that parsed successfully.
    pub fn validate(&self) -> Result<(), AppError> {
        self.limits
            .validate()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("invalid limits: {}", e)))?;
        self.cors
            .validate()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("invalid CORS settings: {}", e)))?;

        if self.system_prompt.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SYSTEM_PROMPT must not be empty"
            )));
        }

        Ok(())
    }
}
