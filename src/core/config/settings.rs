use std::time::Duration;

use super::parsing::{
    env_optional, env_or_default, normalize_route_prefix, parse_base_url, parse_bool,
    parse_environment, parse_u32, parse_u64,
};
use super::token::load_persisted_token;
use super::types::{
    ApiSettings, ConfigError, RuntimeSettings, SessionSettings, Settings, TelemetrySettings,
};
use crate::session::SessionOptions;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(
            env_optional("QUIZ_SESSION_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("QUIZ_SESSION_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let base_url =
            parse_base_url(env_or_default("QUIZ_API_BASE_URL", "http://localhost:3333"))?;
        let token = match env_optional("QUIZ_API_TOKEN") {
            Some(value) => Some(value),
            None => match env_optional("QUIZ_API_TOKEN_FILE") {
                Some(path) => load_persisted_token(&path)?,
                None => None,
            },
        };
        let request_timeout_seconds = parse_u64(
            "QUIZ_REQUEST_TIMEOUT_SECONDS",
            env_or_default("QUIZ_REQUEST_TIMEOUT_SECONDS", "15"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "QUIZ_CONNECT_TIMEOUT_SECONDS",
            env_or_default("QUIZ_CONNECT_TIMEOUT_SECONDS", "5"),
        )?;

        let finalize_max_retries = parse_u32(
            "QUIZ_FINALIZE_MAX_RETRIES",
            env_or_default("QUIZ_FINALIZE_MAX_RETRIES", "2"),
        )?;
        let finalize_retry_backoff_ms = parse_u64(
            "QUIZ_FINALIZE_RETRY_BACKOFF_MS",
            env_or_default("QUIZ_FINALIZE_RETRY_BACKOFF_MS", "500"),
        )?;
        let result_route_prefix =
            normalize_route_prefix(env_or_default("QUIZ_RESULT_ROUTE_PREFIX", "/result"));

        let log_level = env_or_default("QUIZ_SESSION_LOG_LEVEL", "info");
        let json = env_optional("QUIZ_SESSION_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { base_url, token, request_timeout_seconds, connect_timeout_seconds },
            session: SessionSettings {
                finalize_max_retries,
                finalize_retry_backoff_ms,
                result_route_prefix,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions {
            request_timeout: Duration::from_secs(self.api.request_timeout_seconds),
            finalize_max_retries: self.session.finalize_max_retries,
            finalize_retry_backoff: Duration::from_millis(self.session.finalize_retry_backoff_ms),
            result_route_prefix: self.session.result_route_prefix.clone(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_REQUEST_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.api.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_CONNECT_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.api.token.is_none() {
            return Err(ConfigError::MissingSecret("QUIZ_API_TOKEN"));
        }
        if !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(self.api.base_url.clone()));
        }

        Ok(())
    }
}
