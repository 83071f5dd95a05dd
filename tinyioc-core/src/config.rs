use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::constants::ENV_PREFIX;
use crate::error::{ApplicationError, ApplicationResult};
use crate::logging::LoggingConfig;

/// 配置值类型
///
/// 既用于容器配置，也用作 Bean 定义中的字面量属性值
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// 转换为字符串
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 转换为浮点数
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// 转换为布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => parse_bool(s),
            _ => None,
        }
    }

    /// 转换为字符串数组，逗号分隔的字符串也视为数组
    pub fn as_string_array(&self) -> Option<Vec<String>> {
        match self {
            ConfigValue::Array(arr) => {
                Some(arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            }
            ConfigValue::String(s) => Some(
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// 转换 TOML 值为 ConfigValue
    pub fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => {
                ConfigValue::Array(arr.iter().map(ConfigValue::from_toml).collect())
            }
            toml::Value::Table(table) => ConfigValue::Object(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), ConfigValue::from_toml(v)))
                    .collect(),
            ),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// 创建失败后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 不缓存任何状态，下一次 get_bean 重新走完整创建流程
    #[default]
    Retry,
    /// 记住失败原因，之后的 get_bean 直接返回 CreationFailedPreviously
    Poison,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retry" => Ok(FailurePolicy::Retry),
            "poison" => Ok(FailurePolicy::Poison),
            _ => Err(format!("Invalid failure policy: {}", s)),
        }
    }
}

/// Bean 工厂的策略配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FactoryConfig {
    /// 是否允许用同一名称覆盖已注册（但尚未创建）的 Bean 定义
    pub allow_definition_overriding: bool,

    /// 创建失败后的策略
    pub failure_policy: FailurePolicy,
}

impl FactoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// 容器整体配置（对应 `tinyioc.toml`）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub factory: FactoryConfig,
    pub logging: LoggingConfig,
}

impl ContainerConfig {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> ApplicationResult<Self> {
        toml::from_str(content)
            .map_err(|e| ApplicationError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// 从文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> ApplicationResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ApplicationError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content)
    }

    /// 从文件加载配置，文件不存在时使用默认值
    pub fn load_or_default(path: impl AsRef<Path>) -> ApplicationResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// 用 `TINYIOC_` 前缀的环境变量覆盖配置
    pub fn with_env_overrides(self) -> ApplicationResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// 用任意键值来源覆盖配置
    ///
    /// 键名规则：`database.url` -> `TINYIOC_DATABASE_URL`
    pub fn with_overrides<F>(mut self, lookup: F) -> ApplicationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&key_to_env(key));

        if let Some(value) = get("factory.allow-definition-overriding") {
            self.factory.allow_definition_overriding = parse_bool(&value).ok_or_else(|| {
                ApplicationError::Config(format!("Invalid boolean for overriding flag: {}", value))
            })?;
        }
        if let Some(value) = get("factory.failure-policy") {
            self.factory.failure_policy = value.parse().map_err(ApplicationError::Config)?;
        }
        if let Some(value) = get("logging.level") {
            self.logging.level = value.parse().map_err(ApplicationError::Config)?;
        }
        if let Some(value) = get("logging.format") {
            self.logging.format = value.parse().map_err(ApplicationError::Config)?;
        }
        if let Some(rust_log) = lookup("RUST_LOG") {
            self.logging.filter = Some(rust_log);
        }

        Ok(self)
    }
}

/// 将配置键转换为环境变量名
/// 例如: factory.failure-policy -> TINYIOC_FACTORY_FAILURE_POLICY
fn key_to_env(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.replace(['.', '-'], "_").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};

    #[test]
    fn test_parse_full_config() {
        let config = ContainerConfig::from_toml_str(
            r#"
            [factory]
            allow-definition-overriding = true
            failure-policy = "poison"

            [logging]
            level = "debug"
            format = "json"
            show-target = true
            "#,
        )
        .unwrap();

        assert!(config.factory.allow_definition_overriding);
        assert_eq!(config.factory.failure_policy, FailurePolicy::Poison);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.logging.show_target);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = ContainerConfig::from_toml_str("").unwrap();
        assert_eq!(config.factory, FactoryConfig::default());
        assert_eq!(config.factory.failure_policy, FailurePolicy::Retry);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = ContainerConfig::from_toml_str("[factory\nfailure-policy = 1");
        assert!(matches!(result, Err(ApplicationError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TINYIOC_FACTORY_FAILURE_POLICY", "poison"),
            ("TINYIOC_FACTORY_ALLOW_DEFINITION_OVERRIDING", "yes"),
            ("TINYIOC_LOGGING_LEVEL", "warn"),
            ("RUST_LOG", "tinyioc_core=trace"),
        ]
        .into_iter()
        .collect();

        let config = ContainerConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.factory.failure_policy, FailurePolicy::Poison);
        assert!(config.factory.allow_definition_overriding);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.logging.filter.as_deref(), Some("tinyioc_core=trace"));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = ContainerConfig::default().with_overrides(|key| {
            (key == "TINYIOC_FACTORY_FAILURE_POLICY").then(|| "sometimes".to_string())
        });
        assert!(matches!(result, Err(ApplicationError::Config(_))));
    }

    #[test]
    fn test_config_value_conversions() {
        assert_eq!(ConfigValue::from("42").as_i64(), Some(42));
        assert_eq!(ConfigValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ConfigValue::from("yes").as_bool(), Some(true));
        assert_eq!(ConfigValue::Bool(true).as_str(), None);
        assert_eq!(
            ConfigValue::from("a, b,,c").as_string_array(),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_from_toml_nested() {
        let value: toml::Value = toml::from_str("inner = { port = 8080 }").unwrap();
        let config = ConfigValue::from_toml(&value);
        let ConfigValue::Object(map) = config else {
            panic!("expected object");
        };
        let ConfigValue::Object(inner) = &map["inner"] else {
            panic!("expected nested object");
        };
        assert_eq!(inner["port"], ConfigValue::Int(8080));
    }
}
