// tinyioc-core: 类似 Spring 的最小 IoC 容器
//
// 提供按名称注册和获取 Bean 的单例工厂，支持：
// - 首次请求时创建并缓存单例（并发安全，同名只创建一次）
// - 属性值注入和 Bean 引用注入
// - BeanPostProcessor 扩展链
// - 按类型（包括 trait object）查找 Bean
// - 从 TOML 文件读取 Bean 定义

pub mod bean;
pub mod bean_factory;
pub mod bean_post_processor;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod instantiation;
pub mod logging;
pub mod reader;
pub mod utils;

// 重新导出常用类型
pub use bean::{
    BeanDefinition, BeanRef, BeanState, PropertyValue, PropertyValues, ResolvedValue,
    TypeDescriptor, TypeDescriptorBuilder, TypeKey,
};
pub use bean_factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
pub use bean_post_processor::BeanPostProcessor;
pub use config::{ConfigValue, ContainerConfig, FactoryConfig, FailurePolicy};
pub use constants::*;
pub use context::{ApplicationContext, ApplicationContextBuilder};
pub use error::{
    ApplicationError, ApplicationResult, BeanError, BeanResult, HookPhase, Result,
};
pub use instantiation::{
    ConstructorInstantiationStrategy, InstantiationStrategy, PropertyPopulator,
    PropertyValuesPopulator,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use reader::{BeanDefinitionReader, TomlBeanDefinitionReader, TypeRegistry};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{BeanDefinition, BeanRef, BeanState, TypeDescriptor, TypeKey};
    pub use crate::bean_factory::{
        BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
        DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::bean_post_processor::BeanPostProcessor;
    pub use crate::config::{self, ConfigValue, ContainerConfig, FactoryConfig, FailurePolicy};
    pub use crate::context::{ApplicationContext, ApplicationContextBuilder};
    pub use crate::error::{ApplicationError, BeanError, Result};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::reader::{BeanDefinitionReader, TomlBeanDefinitionReader, TypeRegistry};
    pub use crate::utils;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
