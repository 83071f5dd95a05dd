//! Bean 定义读取 - 从 TOML 文件加载 Bean 定义
//!
//! ```toml
//! [[bean]]
//! name = "greetingRepository"
//! type = "GreetingRepository"
//!
//! [[bean]]
//! name = "greetingService"
//! type = "GreetingService"
//!
//! [bean.properties]
//! greeting = "Hello"
//! repository = { ref = "greetingRepository" }
//! ```
//!
//! `type` 是 [`TypeRegistry`] 中注册的别名。写成 `{ ref = "..." }` 的属性是对其他
//! Bean 的引用，其他值按字面量处理。属性按名称排序后写入。

use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::{
    bean::{BeanDefinition, PropertyValue, TypeDescriptor},
    bean_factory::ConfigurableBeanFactory,
    config::ConfigValue,
    constants::BEAN_REFERENCE_KEY,
    error::{BeanError, BeanResult},
    utils::naming::short_type_name,
};

/// 类型注册表 - 类型别名到类型描述的映射
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类型描述；同一别名后注册的覆盖先注册的
    pub fn register(&mut self, alias: impl Into<String>, descriptor: TypeDescriptor) -> &mut Self {
        let alias = alias.into();
        tracing::trace!("Registered type alias '{}' -> {}", alias, descriptor.type_name());
        self.types.insert(alias, descriptor);
        self
    }

    /// 以短类型名（`app::service::UserService` -> `UserService`）注册 `Default` 构造的类型
    pub fn register_default<T>(&mut self) -> &mut Self
    where
        T: Default + Any + Send + Sync,
    {
        let alias = short_type_name(std::any::type_name::<T>()).to_string();
        self.register(alias, TypeDescriptor::of_default::<T>())
    }

    pub fn resolve(&self, alias: &str) -> Option<&TypeDescriptor> {
        self.types.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.types.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Bean 定义读取器
///
/// ApplicationContext 在 refresh 的第一步调用所有读取器
pub trait BeanDefinitionReader: Send + Sync {
    /// 读取器名称（用于日志）
    fn name(&self) -> &str;

    /// 把定义注册到工厂，返回注册的数量
    fn load_bean_definitions(&self, factory: &dyn ConfigurableBeanFactory) -> BeanResult<usize>;
}

#[derive(Debug, Default, Deserialize)]
struct BeanDefinitionsDocument {
    #[serde(default, rename = "bean")]
    beans: Vec<RawBeanDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBeanDefinition {
    name: String,
    #[serde(rename = "type")]
    type_alias: String,
    #[serde(default)]
    properties: toml::Table,
}

/// TOML 文件 Bean 定义读取器
pub struct TomlBeanDefinitionReader {
    source_name: String,
    document: BeanDefinitionsDocument,
    registry: Arc<TypeRegistry>,
}

impl TomlBeanDefinitionReader {
    /// 从文件读取 Bean 定义
    pub fn from_file(path: impl AsRef<Path>, registry: Arc<TypeRegistry>) -> BeanResult<Self> {
        let path = path.as_ref();
        let source_name = path.to_string_lossy().to_string();
        let content = fs::read_to_string(path).map_err(|e| BeanError::DefinitionParse {
            source_name: source_name.clone(),
            reason: format!("failed to read file: {}", e),
        })?;

        Self::from_str(&content, source_name, registry)
    }

    /// 从字符串解析 Bean 定义
    pub fn from_str(
        content: &str,
        source_name: impl Into<String>,
        registry: Arc<TypeRegistry>,
    ) -> BeanResult<Self> {
        let source_name = source_name.into();
        let document: BeanDefinitionsDocument =
            toml::from_str(content).map_err(|e| BeanError::DefinitionParse {
                source_name: source_name.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "Parsed {} bean definition(s) from {}",
            document.beans.len(),
            source_name
        );

        Ok(Self {
            source_name,
            document,
            registry,
        })
    }

    fn to_bean_definition(&self, raw: &RawBeanDefinition) -> BeanResult<BeanDefinition> {
        let invalid = |reason: String| BeanError::InvalidDefinition {
            name: raw.name.clone(),
            reason,
        };

        let descriptor = self
            .registry
            .resolve(&raw.type_alias)
            .ok_or_else(|| invalid(format!("unknown type alias '{}'", raw.type_alias)))?;

        let mut definition = BeanDefinition::new(raw.name.clone(), descriptor.clone());

        for (property, value) in &raw.properties {
            if !descriptor.has_property(property) {
                return Err(invalid(format!(
                    "type {} has no writable property '{}'",
                    descriptor.type_name(),
                    property
                )));
            }

            let value = property_value(value).map_err(|reason| {
                invalid(format!("property '{}': {}", property, reason))
            })?;
            definition.property_values.add(property.clone(), value);
        }

        Ok(definition)
    }
}

/// `{ ref = "name" }` 是引用，其他值是字面量
fn property_value(value: &toml::Value) -> Result<PropertyValue, String> {
    match value {
        toml::Value::Table(table) if table.contains_key(BEAN_REFERENCE_KEY) => {
            if table.len() != 1 {
                return Err(format!(
                    "a bean reference must only contain the '{}' key",
                    BEAN_REFERENCE_KEY
                ));
            }
            match table.get(BEAN_REFERENCE_KEY) {
                Some(toml::Value::String(bean_name)) if !bean_name.trim().is_empty() => {
                    Ok(PropertyValue::Reference(bean_name.clone()))
                }
                _ => Err("a bean reference must name a bean".to_string()),
            }
        }
        other => Ok(PropertyValue::Value(ConfigValue::from_toml(other))),
    }
}

impl BeanDefinitionReader for TomlBeanDefinitionReader {
    fn name(&self) -> &str {
        &self.source_name
    }

    fn load_bean_definitions(&self, factory: &dyn ConfigurableBeanFactory) -> BeanResult<usize> {
        let mut count = 0;

        for raw in &self.document.beans {
            let definition = self.to_bean_definition(raw)?;
            factory.register_bean_definition(raw.name.clone(), definition)?;
            count += 1;
        }

        tracing::info!("Loaded {} bean definition(s) from {}", count, self.source_name);
        Ok(count)
    }
}

impl std::fmt::Debug for TomlBeanDefinitionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TomlBeanDefinitionReader")
            .field("source_name", &self.source_name)
            .field("beans", &self.document.beans.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::{BeanFactoryExt, DefaultListableBeanFactory, ListableBeanFactory};
    use anyhow::anyhow;

    #[derive(Default)]
    struct Repository;

    #[derive(Default)]
    struct Service {
        greeting: String,
        retries: i64,
        repository: Option<Arc<Repository>>,
    }

    fn registry() -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry.register_default::<Repository>().register(
            "Service",
            TypeDescriptor::builder(|| Ok(Service::default()))
                .property("greeting", |s: &mut Service, v| {
                    s.greeting = v.as_str().ok_or_else(|| anyhow!("greeting must be a string"))?.to_string();
                    Ok(())
                })
                .property("retries", |s: &mut Service, v| {
                    s.retries = v.as_i64().ok_or_else(|| anyhow!("retries must be an integer"))?;
                    Ok(())
                })
                .reference("repository", |s: &mut Service, r: Arc<Repository>| {
                    s.repository = Some(r);
                })
                .build(),
        );
        Arc::new(registry)
    }

    const DEFINITIONS: &str = r#"
[[bean]]
name = "repository"
type = "Repository"

[[bean]]
name = "service"
type = "Service"

[bean.properties]
greeting = "Hello"
retries = 3
repository = { ref = "repository" }
"#;

    #[test]
    fn test_register_default_uses_short_type_name() {
        let registry = registry();
        assert!(registry.contains("Repository"));
        assert!(registry.contains("Service"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_load_definitions_in_document_order() {
        let factory = DefaultListableBeanFactory::new();
        let reader = TomlBeanDefinitionReader::from_str(DEFINITIONS, "inline", registry()).unwrap();

        let count = reader.load_bean_definitions(&factory).unwrap();

        assert_eq!(count, 2);
        assert_eq!(factory.get_bean_names(), vec!["repository", "service"]);

        let definition = factory.get_bean_definition("service").unwrap();
        assert_eq!(definition.dependencies(), vec!["repository".to_string()]);
        assert_eq!(
            definition.property_values.get("greeting"),
            Some(&PropertyValue::Value(ConfigValue::from("Hello")))
        );
    }

    #[test]
    fn test_loaded_definitions_create_wired_beans() {
        let factory = DefaultListableBeanFactory::new();
        TomlBeanDefinitionReader::from_str(DEFINITIONS, "inline", registry())
            .unwrap()
            .load_bean_definitions(&factory)
            .unwrap();

        let service = factory.get_bean_as::<Service>("service").unwrap();
        let repository = factory.get_bean_as::<Repository>("repository").unwrap();

        assert_eq!(service.greeting, "Hello");
        assert_eq!(service.retries, 3);
        assert!(Arc::ptr_eq(service.repository.as_ref().unwrap(), &repository));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = TomlBeanDefinitionReader::from_str("[[bean]\nname = ", "broken.toml", registry());
        assert!(matches!(
            result,
            Err(BeanError::DefinitionParse { ref source_name, .. }) if source_name == "broken.toml"
        ));
    }

    #[test]
    fn test_missing_type_field_is_a_parse_error() {
        let result =
            TomlBeanDefinitionReader::from_str("[[bean]]\nname = \"orphan\"\n", "inline", registry());
        assert!(matches!(result, Err(BeanError::DefinitionParse { .. })));
    }

    #[test]
    fn test_unknown_type_alias_is_invalid() {
        let factory = DefaultListableBeanFactory::new();
        let reader = TomlBeanDefinitionReader::from_str(
            "[[bean]]\nname = \"cache\"\ntype = \"RedisCache\"\n",
            "inline",
            registry(),
        )
        .unwrap();

        let result = reader.load_bean_definitions(&factory);

        assert!(matches!(
            result,
            Err(BeanError::InvalidDefinition { ref name, ref reason })
                if name == "cache" && reason.contains("RedisCache")
        ));
        assert_eq!(factory.get_bean_definition_count(), 0);
    }

    #[test]
    fn test_unknown_property_is_invalid() {
        let factory = DefaultListableBeanFactory::new();
        let reader = TomlBeanDefinitionReader::from_str(
            "[[bean]]\nname = \"service\"\ntype = \"Service\"\n[bean.properties]\ntimeout = 5\n",
            "inline",
            registry(),
        )
        .unwrap();

        let result = reader.load_bean_definitions(&factory);
        assert!(matches!(result, Err(BeanError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_malformed_reference_is_invalid() {
        let factory = DefaultListableBeanFactory::new();
        let reader = TomlBeanDefinitionReader::from_str(
            "[[bean]]\nname = \"service\"\ntype = \"Service\"\n[bean.properties]\nrepository = { ref = 1 }\n",
            "inline",
            registry(),
        )
        .unwrap();

        let result = reader.load_bean_definitions(&factory);
        assert!(matches!(result, Err(BeanError::InvalidDefinition { .. })));
    }

    #[test]
    fn test_duplicate_names_surface_factory_error() {
        let factory = DefaultListableBeanFactory::new();
        let reader = TomlBeanDefinitionReader::from_str(
            "[[bean]]\nname = \"repository\"\ntype = \"Repository\"\n\n[[bean]]\nname = \"repository\"\ntype = \"Repository\"\n",
            "inline",
            registry(),
        )
        .unwrap();

        let result = reader.load_bean_definitions(&factory);
        assert!(matches!(result, Err(BeanError::BeanAlreadyExists(_))));
        assert_eq!(factory.get_bean_definition_count(), 1);
    }

    #[test]
    fn test_from_file_missing_file() {
        let result = TomlBeanDefinitionReader::from_file("/nonexistent/beans.toml", registry());
        assert!(matches!(result, Err(BeanError::DefinitionParse { .. })));
    }

    #[test]
    fn test_empty_document_loads_nothing() {
        let factory = DefaultListableBeanFactory::new();
        let reader = TomlBeanDefinitionReader::from_str("", "empty", registry()).unwrap();
        assert_eq!(reader.load_bean_definitions(&factory).unwrap(), 0);
    }
}
