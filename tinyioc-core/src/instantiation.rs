//! 实例化与属性填充协作者
//!
//! 工厂只依赖这两个 trait：如何从类型描述得到原始实例，以及如何把 Bean 定义里的
//! 属性值写入实例。默认实现分别调用类型描述中的构造函数和属性写入函数。

use std::any::Any;

use anyhow::{anyhow, Context};

use crate::bean::{BeanDefinition, PropertyValue, ResolvedValue, TypeDescriptor};
use crate::bean_factory::BeanFactory;

/// 实例化策略 - 根据类型描述产生原始（未填充属性的）实例
pub trait InstantiationStrategy: Send + Sync {
    fn instantiate(&self, descriptor: &TypeDescriptor) -> anyhow::Result<Box<dyn Any + Send + Sync>>;
}

/// 属性填充 - 解析 Bean 定义声明的依赖并写入实例
///
/// `factory` 用于解析对其他 Bean 的引用；回调 `get_bean` 是允许的，
/// 对正在创建中的同名 Bean 的请求会得到 CircularDependency
pub trait PropertyPopulator: Send + Sync {
    fn populate(
        &self,
        instance: &mut (dyn Any + Send + Sync),
        definition: &BeanDefinition,
        factory: &dyn BeanFactory,
    ) -> anyhow::Result<()>;
}

/// 调用类型描述中注册的构造函数
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstructorInstantiationStrategy;

impl InstantiationStrategy for ConstructorInstantiationStrategy {
    fn instantiate(&self, descriptor: &TypeDescriptor) -> anyhow::Result<Box<dyn Any + Send + Sync>> {
        (descriptor.constructor())()
    }
}

/// 按声明顺序把属性值写入实例
///
/// 字面量直接交给写入函数；引用先通过 `factory.get_bean` 解析
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyValuesPopulator;

impl PropertyPopulator for PropertyValuesPopulator {
    fn populate(
        &self,
        instance: &mut (dyn Any + Send + Sync),
        definition: &BeanDefinition,
        factory: &dyn BeanFactory,
    ) -> anyhow::Result<()> {
        for (property, value) in definition.property_values.iter() {
            let setter = definition.descriptor.setter(property).ok_or_else(|| {
                anyhow!(
                    "type {} has no writable property '{}'",
                    definition.type_name(),
                    property
                )
            })?;

            let resolved = match value {
                PropertyValue::Value(v) => ResolvedValue::Value(v.clone()),
                PropertyValue::Reference(bean_name) => {
                    tracing::trace!(
                        "Resolving reference '{}' for property '{}' of bean '{}'",
                        bean_name,
                        property,
                        definition.name
                    );
                    ResolvedValue::Bean(factory.get_bean(bean_name)?)
                }
            };

            setter(&mut *instance, resolved)
                .with_context(|| format!("failed to set property '{}'", property))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::bean::BeanRef;
    use crate::error::{BeanError, BeanResult};

    /// 只做名称查找的工厂
    #[derive(Default)]
    struct MapFactory {
        beans: HashMap<String, BeanRef>,
    }

    impl BeanFactory for MapFactory {
        fn get_bean(&self, name: &str) -> BeanResult<BeanRef> {
            self.beans
                .get(name)
                .cloned()
                .ok_or_else(|| BeanError::UnknownBeanName(name.to_string()))
        }

        fn contains_bean(&self, name: &str) -> bool {
            self.beans.contains_key(name)
        }
    }

    #[derive(Debug, Default)]
    struct DataSource {
        url: String,
    }

    #[derive(Debug, Default)]
    struct Repository {
        table: String,
        pool_size: i64,
        data_source: Option<Arc<DataSource>>,
    }

    fn repository_descriptor() -> TypeDescriptor {
        TypeDescriptor::builder(|| Ok(Repository::default()))
            .property("table", |r: &mut Repository, v| {
                r.table = v.as_str().ok_or_else(|| anyhow!("table must be a string"))?.to_string();
                Ok(())
            })
            .property("pool-size", |r: &mut Repository, v| {
                r.pool_size = v.as_i64().ok_or_else(|| anyhow!("pool-size must be an integer"))?;
                Ok(())
            })
            .reference("data-source", |r: &mut Repository, ds: Arc<DataSource>| {
                r.data_source = Some(ds);
            })
            .build()
    }

    fn populate(definition: &BeanDefinition, factory: &MapFactory) -> anyhow::Result<Box<Repository>> {
        let mut instance = ConstructorInstantiationStrategy.instantiate(&definition.descriptor)?;
        PropertyValuesPopulator.populate(&mut *instance, definition, factory)?;
        instance
            .downcast::<Repository>()
            .map_err(|_| anyhow!("unexpected instance type"))
    }

    #[test]
    fn test_constructor_strategy_builds_raw_instance() {
        let instance = ConstructorInstantiationStrategy
            .instantiate(&repository_descriptor())
            .unwrap();

        let repository = instance.downcast::<Repository>().unwrap();
        assert!(repository.table.is_empty());
        assert!(repository.data_source.is_none());
    }

    #[test]
    fn test_populates_values_and_references() {
        let data_source: BeanRef = Arc::new(DataSource {
            url: "postgres://localhost/app".to_string(),
        });
        let mut factory = MapFactory::default();
        factory.beans.insert("dataSource".to_string(), data_source.clone());

        let definition = BeanDefinition::new("repository", repository_descriptor())
            .with_value("table", "users")
            .with_value("pool-size", 8_i64)
            .with_reference("data-source", "dataSource");

        let repository = populate(&definition, &factory).unwrap();

        assert_eq!(repository.table, "users");
        assert_eq!(repository.pool_size, 8);
        let resolved = repository.data_source.as_ref().unwrap();
        assert_eq!(resolved.url, "postgres://localhost/app");
        assert!(Arc::ptr_eq(&(resolved.clone() as BeanRef), &data_source));
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let definition =
            BeanDefinition::new("repository", repository_descriptor()).with_value("schema", "public");

        let err = populate(&definition, &MapFactory::default()).unwrap_err();
        assert!(err.to_string().contains("no writable property 'schema'"));
    }

    #[test]
    fn test_missing_reference_surfaces_bean_error() {
        let definition = BeanDefinition::new("repository", repository_descriptor())
            .with_reference("data-source", "dataSource");

        let err = populate(&definition, &MapFactory::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BeanError>(),
            Some(BeanError::UnknownBeanName(name)) if name == "dataSource"
        ));
    }

    #[test]
    fn test_value_for_reference_property_fails() {
        let definition = BeanDefinition::new("repository", repository_descriptor())
            .with_value("data-source", "dataSource");

        let err = populate(&definition, &MapFactory::default()).unwrap_err();
        assert!(err.to_string().contains("failed to set property 'data-source'"));
    }
}
