use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("缺少配置项: {0}")]
    Missing(&'static str),
    #[error("配置项 {key} 的值无效: {value}")]
    Invalid { key: &'static str, value: String },
}

pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// LLM 接口配置
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    /// OpenAI 兼容接口的 base URL
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Flomo 导出配置
#[derive(Debug, Clone, PartialEq)]
pub struct FlomoSettings {
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// 运行配置
///
/// 来自环境变量（启动时会先加载 `.env`）。接口地址只在用到时才检查
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub flomo_endpoint: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Settings {
    /// 从进程环境变量读取配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    ///
    /// # 参数
    /// - `lookup`: 按变量名取值，空白值视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_retries = parse_or(get("MAX_RETRIES"), "MAX_RETRIES", crate::retry::DEFAULT_MAX_RETRIES)?;
        let base_delay_secs = parse_or(
            get("RETRY_BASE_DELAY_SECS"),
            "RETRY_BASE_DELAY_SECS",
            crate::retry::DEFAULT_BASE_DELAY.as_secs(),
        )?;
        let timeout_secs = parse_or(get("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let llm_temperature = parse_or(get("LLM_TEMPERATURE"), "LLM_TEMPERATURE", DEFAULT_LLM_TEMPERATURE)?;

        Ok(Self {
            llm_endpoint: get("LLM_API_ENDPOINT"),
            llm_api_key: get("LLM_API_KEY"),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_temperature,
            flomo_endpoint: get("FLOMO_API_ENDPOINT"),
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryPolicy::new(max_retries, Duration::from_secs(base_delay_secs)),
        })
    }

    /// 取 LLM 配置，缺少接口地址时报错
    pub fn llm(&self) -> Result<LlmSettings, ConfigError> {
        let endpoint = self
            .llm_endpoint
            .clone()
            .ok_or(ConfigError::Missing("LLM_API_ENDPOINT"))?;

        Ok(LlmSettings {
            endpoint,
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            timeout: self.timeout,
        })
    }

    /// 取 Flomo 配置，缺少接口地址时报错
    pub fn flomo(&self) -> Result<FlomoSettings, ConfigError> {
        let endpoint = self
            .flomo_endpoint
            .clone()
            .ok_or(ConfigError::Missing("FLOMO_API_ENDPOINT"))?;

        Ok(FlomoSettings {
            endpoint,
            timeout: self.timeout,
            retry: self.retry,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();

        assert_eq!(settings.llm_endpoint, None);
        assert_eq!(settings.llm_model, "gpt-4o-mini");
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let settings = settings_from(&[
            ("LLM_API_ENDPOINT", "https://api.example.com/v1"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_MODEL", "qwen-plus"),
            ("FLOMO_API_ENDPOINT", "https://flomoapp.com/iwh/abc"),
            ("MAX_RETRIES", "5"),
            ("RETRY_BASE_DELAY_SECS", "2"),
            ("REQUEST_TIMEOUT_SECS", "30"),
        ])
        .unwrap();

        let llm = settings.llm().unwrap();
        assert_eq!(llm.endpoint, "https://api.example.com/v1");
        assert_eq!(llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(llm.model, "qwen-plus");
        assert_eq!(llm.timeout, Duration::from_secs(30));

        let flomo = settings.flomo().unwrap();
        assert_eq!(flomo.endpoint, "https://flomoapp.com/iwh/abc");
        assert_eq!(flomo.retry, RetryPolicy::new(5, Duration::from_secs(2)));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = settings_from(&[("LLM_API_ENDPOINT", "   "), ("MAX_RETRIES", "")]).unwrap();

        assert_eq!(settings.llm(), Err(ConfigError::Missing("LLM_API_ENDPOINT")));
        assert_eq!(settings.retry.max_retries, 3);
    }

    #[test]
    fn test_missing_flomo_endpoint() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.flomo(), Err(ConfigError::Missing("FLOMO_API_ENDPOINT")));
    }

    #[test]
    fn test_invalid_number() {
        let result = settings_from(&[("MAX_RETRIES", "three")]);

        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                key: "MAX_RETRIES",
                value: "three".to_string(),
            })
        );
    }
}
