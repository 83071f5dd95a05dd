//! 容器常量定义
//!
//! 配置文件名、环境变量前缀等在 context、config 和示例之间共享的标识符

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "tinyioc.toml";

/// 环境变量覆盖配置时使用的前缀
pub const ENV_PREFIX: &str = "TINYIOC_";

/// Bean 定义文件中引用其他 Bean 的键名：`repository = { ref = "userRepository" }`
pub const BEAN_REFERENCE_KEY: &str = "ref";
