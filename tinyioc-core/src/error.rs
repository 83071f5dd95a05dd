//! 统一的错误处理类型
//!
//! 容器对外暴露 [`BeanError`]（thiserror），协作者边界（构造函数、属性填充、
//! BeanPostProcessor 钩子）使用 `anyhow::Result`，由工厂包装成对应的变体。
//!
//! # 示例
//!
//! ```rust,ignore
//! match factory.get_bean("userService") {
//!     Err(BeanError::UnknownBeanName(name)) => tracing::warn!("missing bean '{}'", name),
//!     Err(e) => return Err(e.into()),
//!     Ok(bean) => { /* ... */ }
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// BeanPostProcessor 的钩子阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// post_process_before_initialization
    Before,
    /// post_process_after_initialization
    After,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Before => write!(f, "before-initialization"),
            HookPhase::After => write!(f, "after-initialization"),
        }
    }
}

/// Bean 工厂错误
#[derive(Debug, Error)]
pub enum BeanError {
    /// Bean 名称为空
    #[error("invalid bean name {0:?}: bean names must not be empty")]
    InvalidBeanName(String),

    /// 名称已被注册（且不允许覆盖）
    #[error("bean '{0}' is already registered")]
    BeanAlreadyExists(String),

    /// 名称从未注册
    #[error("no bean named '{0}' is defined")]
    UnknownBeanName(String),

    /// 配置已冻结，不再接受新的 Bean 定义
    #[error("cannot register bean '{0}': bean factory configuration is frozen")]
    ConfigurationFrozen(String),

    /// 实例化协作者无法构造原始实例
    #[error("failed to instantiate bean '{name}' of type {type_name}")]
    Instantiation {
        name: String,
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// 属性填充失败
    #[error("failed to populate properties of bean '{name}'")]
    Population {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// BeanPostProcessor 钩子失败
    #[error("bean post processor '{processor}' failed during {phase} of bean '{name}'")]
    PostProcessor {
        name: String,
        processor: String,
        phase: HookPhase,
        #[source]
        source: anyhow::Error,
    },

    /// 创建过程中再次请求同名 Bean
    #[error("circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// poison 策略下，之前创建失败的 Bean
    #[error("bean '{name}' failed to initialize earlier and will not be retried: {reason}")]
    CreationFailedPreviously { name: String, reason: String },

    /// Bean 实例不是期望的类型
    #[error("bean '{name}' is not of the expected type {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// Bean 定义内容无效（未知类型等）
    #[error("invalid definition for bean '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// Bean 定义文件无法解析
    #[error("failed to parse bean definitions from {source_name}: {reason}")]
    DefinitionParse { source_name: String, reason: String },

    /// 静态依赖校验失败
    #[error("dependency validation failed: {0}")]
    DependencyValidation(String),
}

impl BeanError {
    /// 是否为循环依赖错误
    pub fn is_circular_dependency(&self) -> bool {
        matches!(self, BeanError::CircularDependency { .. })
    }
}

pub type BeanResult<T> = std::result::Result<T, BeanError>;

/// 应用上下文层面的错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Bean(#[from] BeanError),

    #[error("application context has already been refreshed")]
    AlreadyRefreshed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

pub type ApplicationResult<T> = std::result::Result<T, ApplicationError>;

pub use anyhow::Result;
