use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{anyhow, bail};

use crate::config::ConfigValue;
use crate::utils::naming::{short_type_name, to_camel_case};

/// 容器交给调用方的 Bean 句柄
pub type BeanRef = Arc<dyn Any + Send + Sync>;

/// 类型标识 - 类型过滤查找的查询键
///
/// 既可以是具体类型，也可以是 trait object（`TypeKey::of::<dyn BeanPostProcessor>()`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 构造函数 - 产生尚未填充属性的原始实例
pub type Constructor = Arc<dyn Fn() -> anyhow::Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// 能力转换：把 Bean 句柄转换成 `Box<Arc<C>>`（类型擦除后存储）
type Caster = Arc<dyn Fn(&BeanRef) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// 属性写入函数
pub type PropertySetter =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync), ResolvedValue) -> anyhow::Result<()> + Send + Sync>;

/// 类型描述 - 如何构造一个 Bean、它可以赋值给哪些类型、有哪些可写属性
///
/// 工厂只通过 [`TypeDescriptor::is_assignable_to`] 和能力转换使用它，
/// 构造与属性写入交给实例化/属性填充协作者
#[derive(Clone)]
pub struct TypeDescriptor {
    key: TypeKey,
    constructor: Constructor,
    capabilities: Vec<(TypeKey, Caster)>,
    setters: HashMap<String, PropertySetter>,
}

impl TypeDescriptor {
    /// 以构造函数开始构建类型描述
    pub fn builder<T, F>(constructor: F) -> TypeDescriptorBuilder<T>
    where
        T: Any + Send + Sync,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move || {
            let instance = constructor()?;
            Ok(Box::new(instance) as Box<dyn Any + Send + Sync>)
        });

        TypeDescriptorBuilder {
            descriptor: TypeDescriptor {
                key: TypeKey::of::<T>(),
                constructor,
                capabilities: Vec::new(),
                setters: HashMap::new(),
            },
            _marker: PhantomData,
        }
        .implements::<T>(|bean| bean)
    }

    /// 使用 `Default` 构造的类型描述
    pub fn of_default<T>() -> Self
    where
        T: Default + Any + Send + Sync,
    {
        Self::builder(|| Ok(T::default())).build()
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// 声明的类型是否可以赋值给 `key`
    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.capabilities.iter().any(|(k, _)| k == key)
    }

    /// 所有可赋值的类型
    pub fn assignable_types(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.capabilities.iter().map(|(k, _)| *k)
    }

    /// 把 Bean 句柄转换成某个能力视图
    ///
    /// 如果 Bean 被 BeanPostProcessor 替换成了别的类型，返回 None
    pub fn cast<C>(&self, bean: &BeanRef) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<C>();
        let (_, caster) = self.capabilities.iter().find(|(k, _)| *k == key)?;
        let boxed = caster(bean)?;
        boxed.downcast::<Arc<C>>().ok().map(|arc| *arc)
    }

    pub fn setter(&self, property: &str) -> Option<&PropertySetter> {
        self.setters.get(property)
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.setters.contains_key(property)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut properties: Vec<&String> = self.setters.keys().collect();
        properties.sort();
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.key.name)
            .field(
                "assignable_to",
                &self.capabilities.iter().map(|(k, _)| k.name).collect::<Vec<_>>(),
            )
            .field("properties", &properties)
            .finish()
    }
}

/// TypeDescriptor 构建器，保留具体类型 `T` 以便注册能力和属性
pub struct TypeDescriptorBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeDescriptorBuilder<T> {
    /// 声明 `T` 可以赋值给 `C`（通常是 trait object）
    ///
    /// ```ignore
    /// TypeDescriptor::builder(|| Ok(AuditProcessor::default()))
    ///     .implements::<dyn BeanPostProcessor>(|p| p as Arc<dyn BeanPostProcessor>)
    ///     .build();
    /// ```
    pub fn implements<C>(mut self, cast: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<C>();
        if self.descriptor.is_assignable_to(&key) {
            return self;
        }

        let caster: Caster = Arc::new(move |bean: &BeanRef| {
            Arc::clone(bean)
                .downcast::<T>()
                .ok()
                .map(|typed| Box::new(cast(typed)) as Box<dyn Any + Send + Sync>)
        });
        self.descriptor.capabilities.push((key, caster));
        self
    }

    /// 声明一个字面量属性
    pub fn property<F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut T, &ConfigValue) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let property = name.clone();
        let setter: PropertySetter = Arc::new(
            move |instance: &mut (dyn Any + Send + Sync), value: ResolvedValue| {
                let target = downcast_target::<T>(instance)?;
                match value {
                    ResolvedValue::Value(v) => setter(target, &v),
                    ResolvedValue::Bean(_) => {
                        bail!("property '{}' expects a value, got a bean reference", property)
                    }
                }
            },
        );
        self.descriptor.setters.insert(name, setter);
        self
    }

    /// 声明一个引用其他 Bean 的属性
    pub fn reference<D, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        D: Any + Send + Sync,
        F: Fn(&mut T, Arc<D>) + Send + Sync + 'static,
    {
        let name = name.into();
        let property = name.clone();
        let setter: PropertySetter = Arc::new(
            move |instance: &mut (dyn Any + Send + Sync), value: ResolvedValue| {
                let target = downcast_target::<T>(instance)?;
                match value {
                    ResolvedValue::Bean(bean) => {
                        let dependency = bean.downcast::<D>().map_err(|_| {
                            anyhow!(
                                "bean referenced by property '{}' is not a {}",
                                property,
                                std::any::type_name::<D>()
                            )
                        })?;
                        setter(target, dependency);
                        Ok(())
                    }
                    ResolvedValue::Value(_) => {
                        bail!("property '{}' expects a bean reference, got a value", property)
                    }
                }
            },
        );
        self.descriptor.setters.insert(name, setter);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

fn downcast_target<T: Any>(instance: &mut (dyn Any + Send + Sync)) -> anyhow::Result<&mut T> {
    instance
        .downcast_mut::<T>()
        .ok_or_else(|| anyhow!("property target is not a {}", std::any::type_name::<T>()))
}

/// Bean 定义中的属性值
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// 字面量
    Value(ConfigValue),
    /// 对另一个 Bean 的引用（按名称）
    Reference(String),
}

/// 解析后的属性值，交给属性写入函数
pub enum ResolvedValue {
    Value(ConfigValue),
    Bean(BeanRef),
}

/// 有序的属性值列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyValues {
    values: Vec<(String, PropertyValue)>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加属性值；同名属性覆盖之前的值并保持原位置
    pub fn add(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bean 定义 - 描述如何创建一个 Bean
///
/// 定义本身在注册后不再变化，缓存槽位由工厂的注册表条目持有
#[derive(Clone)]
pub struct BeanDefinition {
    /// Bean 的名称
    pub name: String,

    /// 类型描述
    pub descriptor: TypeDescriptor,

    /// 属性值（字面量和 Bean 引用）
    pub property_values: PropertyValues,
}

impl BeanDefinition {
    /// 创建新的 Bean 定义
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            property_values: PropertyValues::new(),
        }
    }

    /// 使用 `Default` 构造，名称取类型名的 camelCase（`UserService` -> `userService`）
    pub fn of<T>() -> Self
    where
        T: Default + Any + Send + Sync,
    {
        let name = to_camel_case(short_type_name(std::any::type_name::<T>()));
        Self::new(name, TypeDescriptor::of_default::<T>())
    }

    /// 设置字面量属性
    pub fn with_value(mut self, property: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.property_values
            .add(property, PropertyValue::Value(value.into()));
        self
    }

    /// 设置 Bean 引用属性
    pub fn with_reference(mut self, property: impl Into<String>, bean_name: impl Into<String>) -> Self {
        self.property_values
            .add(property, PropertyValue::Reference(bean_name.into()));
        self
    }

    /// 通过属性引用声明的依赖（用于静态依赖分析）
    pub fn dependencies(&self) -> Vec<String> {
        self.property_values
            .iter()
            .filter_map(|(_, value)| match value {
                PropertyValue::Reference(name) => Some(name.clone()),
                PropertyValue::Value(_) => None,
            })
            .collect()
    }

    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type_name", &self.descriptor.type_name())
            .field("property_values", &self.property_values)
            .finish()
    }
}

/// Bean 的生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeanState {
    /// 已注册，尚未创建
    Registered,
    /// 正在创建（实例化、属性填充或钩子执行中）
    InProgress,
    /// 已创建并缓存
    Done,
    /// 最近一次创建失败
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Default)]
    struct EnglishGreeter {
        name: String,
        repository: Option<Arc<Repository>>,
    }

    impl Greeter for EnglishGreeter {
        fn greet(&self) -> String {
            format!("hello, {}", self.name)
        }
    }

    #[derive(Default)]
    struct Repository;

    fn greeter_descriptor() -> TypeDescriptor {
        TypeDescriptor::builder(|| Ok(EnglishGreeter::default()))
            .implements::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
            .property("name", |g: &mut EnglishGreeter, v| {
                g.name = v.as_str().ok_or_else(|| anyhow!("name must be a string"))?.to_string();
                Ok(())
            })
            .reference("repository", |g: &mut EnglishGreeter, r: Arc<Repository>| {
                g.repository = Some(r);
            })
            .build()
    }

    #[test]
    fn test_type_key_for_trait_objects() {
        let key = TypeKey::of::<dyn Greeter>();
        assert_eq!(key, TypeKey::of::<dyn Greeter>());
        assert_ne!(key, TypeKey::of::<EnglishGreeter>());
        assert!(key.name().contains("Greeter"));
    }

    #[test]
    fn test_descriptor_assignability() {
        let descriptor = greeter_descriptor();
        assert!(descriptor.is_assignable_to(&TypeKey::of::<EnglishGreeter>()));
        assert!(descriptor.is_assignable_to(&TypeKey::of::<dyn Greeter>()));
        assert!(!descriptor.is_assignable_to(&TypeKey::of::<Repository>()));
        assert_eq!(descriptor.assignable_types().count(), 2);
    }

    #[test]
    fn test_cast_to_capability() {
        let descriptor = greeter_descriptor();
        let bean: BeanRef = Arc::new(EnglishGreeter {
            name: "world".to_string(),
            repository: None,
        });

        let greeter = descriptor.cast::<dyn Greeter>(&bean).unwrap();
        assert_eq!(greeter.greet(), "hello, world");

        let concrete = descriptor.cast::<EnglishGreeter>(&bean).unwrap();
        assert_eq!(concrete.name, "world");

        // 被替换成其他类型后无法转换
        let replaced: BeanRef = Arc::new(Repository);
        assert!(descriptor.cast::<dyn Greeter>(&replaced).is_none());
    }

    #[test]
    fn test_setters() {
        let descriptor = greeter_descriptor();
        let mut instance = (descriptor.constructor())().unwrap();

        let name_setter = descriptor.setter("name").unwrap();
        name_setter(&mut *instance, ResolvedValue::Value(ConfigValue::from("rust"))).unwrap();

        let repo_setter = descriptor.setter("repository").unwrap();
        repo_setter(&mut *instance, ResolvedValue::Bean(Arc::new(Repository))).unwrap();

        let greeter = instance.downcast::<EnglishGreeter>().unwrap();
        assert_eq!(greeter.greet(), "hello, rust");
        assert!(greeter.repository.is_some());
    }

    #[test]
    fn test_setter_kind_mismatch() {
        let descriptor = greeter_descriptor();
        let mut instance = (descriptor.constructor())().unwrap();

        let name_setter = descriptor.setter("name").unwrap();
        let err = name_setter(&mut *instance, ResolvedValue::Bean(Arc::new(Repository))).unwrap_err();
        assert!(err.to_string().contains("expects a value"));

        let repo_setter = descriptor.setter("repository").unwrap();
        let err = repo_setter(&mut *instance, ResolvedValue::Bean(Arc::new(1_u8))).unwrap_err();
        assert!(err.to_string().contains("is not a"));
    }

    #[test]
    fn test_definition_of_uses_camel_case_name() {
        let definition = BeanDefinition::of::<EnglishGreeter>();
        assert_eq!(definition.name, "englishGreeter");
    }

    #[test]
    fn test_definition_dependencies() {
        let definition = BeanDefinition::new("greeter", greeter_descriptor())
            .with_value("name", "world")
            .with_reference("repository", "repository")
            .with_reference("repository", "otherRepository");

        assert_eq!(definition.property_values.len(), 2);
        assert_eq!(definition.dependencies(), vec!["otherRepository".to_string()]);
    }
}
