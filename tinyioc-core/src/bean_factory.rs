//! Bean Factory - 核心容器接口
//!
//! 参考 Spring 的 BeanFactory 架构设计：名称到定义的注册表、按需创建并缓存的单例、
//! 以及在初始化前后执行的 BeanPostProcessor 链

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::{
    bean::{BeanDefinition, BeanRef, BeanState, TypeKey},
    bean_post_processor::BeanPostProcessor,
    config::{FactoryConfig, FailurePolicy},
    error::{BeanError, BeanResult, HookPhase},
    instantiation::{
        ConstructorInstantiationStrategy, InstantiationStrategy, PropertyPopulator,
        PropertyValuesPopulator,
    },
    utils::dependency::CreationTracker,
};

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

/// BeanFactory - 最基础的容器接口
///
/// 提供基本的 Bean 访问功能，类似 Spring 的 BeanFactory
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用（属性填充协作者通过
/// `&dyn BeanFactory` 解析引用）
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean，首次请求时创建
    fn get_bean(&self, name: &str) -> BeanResult<BeanRef>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;
}

/// BeanFactoryExt - BeanFactory 的扩展 trait
///
/// 提供泛型方法，不能作为 trait object 使用
pub trait BeanFactoryExt: BeanFactory {
    /// 通过名称获取 Bean 并转换为具体类型
    fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> BeanResult<Arc<T>> {
        self.get_bean(name)?
            .downcast::<T>()
            .map_err(|_| BeanError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

/// ListableBeanFactory - 可列举的 Bean 工厂
///
/// 扩展 BeanFactory，提供列举所有 Bean 的能力
pub trait ListableBeanFactory: BeanFactory {
    /// 获取所有 Bean 的名称（注册顺序）
    fn get_bean_names(&self) -> Vec<String>;

    /// 获取 Bean 定义的数量
    fn get_bean_definition_count(&self) -> usize;

    /// 获取声明类型可以赋值给 `key` 的所有 Bean 名称（注册顺序）
    fn get_bean_names_for_type(&self, key: &TypeKey) -> Vec<String>;

    /// 获取声明类型可以赋值给 `key` 的所有 Bean（注册顺序）
    ///
    /// 尚未创建的 Bean 会在这里被创建
    fn get_beans_for_type(&self, key: &TypeKey) -> BeanResult<Vec<BeanRef>>;
}

/// ConfigurableBeanFactory - 可配置的 Bean 工厂
///
/// 提供注册定义和后置处理器的能力
pub trait ConfigurableBeanFactory: BeanFactory {
    /// 注册 Bean 定义
    fn register_bean_definition(&self, name: String, definition: BeanDefinition) -> BeanResult<()>;

    /// 检查是否包含指定的 Bean 定义
    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 获取单个 Bean 定义
    fn get_bean_definition(&self, name: &str) -> BeanResult<BeanDefinition>;

    /// 添加 BeanPostProcessor（追加到链尾）
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    /// 获取所有 BeanPostProcessor（注册顺序）
    fn get_bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>>;

    /// 获取 Bean 的生命周期状态
    fn bean_state(&self, name: &str) -> Option<BeanState>;
}

/// ConfigurableListableBeanFactory - 可配置且可列举的 Bean 工厂
///
/// 结合了 ListableBeanFactory 和 ConfigurableBeanFactory 的功能
pub trait ConfigurableListableBeanFactory: ListableBeanFactory + ConfigurableBeanFactory {
    /// 预实例化所有单例 Bean（注册顺序，遇到第一个错误即停止）
    fn preinstantiate_singletons(&self) -> BeanResult<()>;

    /// 冻结配置（不再允许注册 Bean 定义）
    fn freeze_configuration(&self);

    /// 检查配置是否已冻结
    fn is_configuration_frozen(&self) -> bool;

    /// 获取所有 Bean 通过属性引用声明的依赖（用于依赖验证）
    fn get_bean_dependencies(&self) -> HashMap<String, Vec<String>>;
}

/// 注册表条目：定义 + 缓存槽位 + 状态
struct BeanEntry {
    definition: BeanDefinition,

    /// 单例缓存，只会被设置一次
    instance: OnceCell<BeanRef>,

    state: Mutex<BeanState>,

    /// poison 策略下记录的失败原因
    failure: Mutex<Option<String>>,
}

impl BeanEntry {
    fn new(definition: BeanDefinition) -> Self {
        Self {
            definition,
            instance: OnceCell::new(),
            state: Mutex::new(BeanState::Registered),
            failure: Mutex::new(None),
        }
    }

    fn state(&self) -> BeanState {
        *self.state.lock()
    }

    fn set_state(&self, state: BeanState) {
        *self.state.lock() = state;
    }
}

/// 构造函数或钩子 panic 时，把停留在 InProgress 的状态改为 Failed
struct InProgressGuard<'a> {
    entry: &'a BeanEntry,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.entry.state.lock();
        if *state == BeanState::InProgress {
            *state = BeanState::Failed;
        }
    }
}

/// DefaultListableBeanFactory - ConfigurableListableBeanFactory 的默认实现
///
/// 同一名称最多创建一个实例：缓存命中走无锁的 `OnceCell::get`，
/// 未命中时 `get_or_try_init` 按名称串行化创建，不同名称之间互不阻塞。
pub struct DefaultListableBeanFactory {
    /// 工厂标识（用于区分线程内的创建栈）
    id: u64,

    /// 策略配置
    config: FactoryConfig,

    /// Bean 定义存储
    definitions: RwLock<HashMap<String, Arc<BeanEntry>>>,

    /// 注册顺序（预实例化顺序）
    bean_definition_names: RwLock<Vec<String>>,

    /// Bean 后置处理器列表（注册顺序）
    bean_post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,

    /// 实例化协作者
    instantiation_strategy: Arc<dyn InstantiationStrategy>,

    /// 属性填充协作者
    property_populator: Arc<dyn PropertyPopulator>,

    /// 循环依赖检测
    creation_tracker: CreationTracker,

    /// 配置是否已冻结
    configuration_frozen: RwLock<bool>,
}

impl DefaultListableBeanFactory {
    /// 创建新的 Bean 工厂
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    /// 使用指定策略配置创建 Bean 工厂
    pub fn with_config(config: FactoryConfig) -> Self {
        let id = NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            config,
            definitions: RwLock::new(HashMap::new()),
            bean_definition_names: RwLock::new(Vec::new()),
            bean_post_processors: RwLock::new(Vec::new()),
            instantiation_strategy: Arc::new(ConstructorInstantiationStrategy),
            property_populator: Arc::new(PropertyValuesPopulator),
            creation_tracker: CreationTracker::new(id),
            configuration_frozen: RwLock::new(false),
        }
    }

    /// 替换实例化与属性填充协作者
    pub fn with_collaborators(
        mut self,
        instantiation_strategy: Arc<dyn InstantiationStrategy>,
        property_populator: Arc<dyn PropertyPopulator>,
    ) -> Self {
        self.instantiation_strategy = instantiation_strategy;
        self.property_populator = property_populator;
        self
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// 获取声明类型可以赋值给 `C` 的所有 Bean，并转换为 `Arc<C>`
    ///
    /// 被 BeanPostProcessor 替换成其他类型的 Bean 无法转换，返回 TypeMismatch
    pub fn get_beans_of_type<C>(&self) -> BeanResult<Vec<Arc<C>>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<C>();
        let mut beans = Vec::new();

        for (name, entry) in self.ordered_entries() {
            let descriptor = &entry.definition.descriptor;
            if !descriptor.is_assignable_to(&key) {
                continue;
            }

            let bean = self.get_bean(&name)?;
            let typed = descriptor
                .cast::<C>(&bean)
                .ok_or_else(|| BeanError::TypeMismatch {
                    name: name.clone(),
                    expected: key.name(),
                })?;
            beans.push(typed);
        }

        tracing::debug!("Found {} bean(s) of type {}", beans.len(), key);
        Ok(beans)
    }

    fn entry(&self, name: &str) -> BeanResult<Arc<BeanEntry>> {
        self.definitions.read().get(name).cloned().ok_or_else(|| {
            tracing::debug!("Bean '{}' not found in container", name);
            BeanError::UnknownBeanName(name.to_string())
        })
    }

    /// 按注册顺序的条目快照
    fn ordered_entries(&self) -> Vec<(String, Arc<BeanEntry>)> {
        let definitions = self.definitions.read();
        let names = self.bean_definition_names.read();
        names
            .iter()
            .filter_map(|name| {
                definitions
                    .get(name)
                    .map(|entry| (name.clone(), Arc::clone(entry)))
            })
            .collect()
    }

    /// 缓存未命中时的创建入口（已在 `get_or_try_init` 内，同名创建被串行化）
    fn create_bean(&self, name: &str, entry: &BeanEntry) -> BeanResult<BeanRef> {
        if let Some(reason) = entry.failure.lock().clone() {
            tracing::debug!("Bean '{}' is poisoned, not retrying creation", name);
            return Err(BeanError::CreationFailedPreviously {
                name: name.to_string(),
                reason,
            });
        }

        tracing::info!("Creating shared instance of singleton bean '{}'", name);
        entry.set_state(BeanState::InProgress);
        let _in_progress = InProgressGuard { entry };

        match self.do_create_bean(name, &entry.definition) {
            Ok(bean) => {
                entry.set_state(BeanState::Done);
                tracing::debug!("Singleton bean '{}' created and cached", name);
                Ok(bean)
            }
            Err(e) => {
                entry.set_state(BeanState::Failed);
                if self.config.failure_policy == FailurePolicy::Poison {
                    *entry.failure.lock() = Some(e.to_string());
                }
                tracing::warn!("Creation of bean '{}' failed: {}", name, e);
                Err(e)
            }
        }
    }

    /// 创建 Bean 实例并执行生命周期
    ///
    /// # Bean 生命周期顺序
    /// 1. 实例化（InstantiationStrategy）
    /// 2. 属性填充（PropertyPopulator），此时实例只被当前线程持有
    /// 3. BeanPostProcessor.post_process_before_initialization（注册顺序）
    /// 4. BeanPostProcessor.post_process_after_initialization（注册顺序）
    fn do_create_bean(&self, name: &str, definition: &BeanDefinition) -> BeanResult<BeanRef> {
        // 1. 实例化
        let mut instance = self
            .instantiation_strategy
            .instantiate(&definition.descriptor)
            .map_err(|source| BeanError::Instantiation {
                name: name.to_string(),
                type_name: definition.type_name(),
                source,
            })?;

        // 2. 属性填充
        tracing::debug!(
            "Populating {} property value(s) of bean '{}'",
            definition.property_values.len(),
            name
        );
        self.property_populator
            .populate(&mut *instance, definition, self)
            .map_err(|e| population_error(name, e))?;

        let bean: BeanRef = Arc::from(instance);

        // 同一次创建的两个阶段使用同一份处理器快照
        let processors = self.get_bean_post_processors();

        // 3. BeanPostProcessor.postProcessBeforeInitialization
        let bean = self.apply_bean_post_processors_before_initialization(&processors, bean, name)?;

        // 4. BeanPostProcessor.postProcessAfterInitialization
        self.apply_bean_post_processors_after_initialization(&processors, bean, name)
    }

    /// 应用 BeanPostProcessor.postProcessBeforeInitialization
    fn apply_bean_post_processors_before_initialization(
        &self,
        processors: &[Arc<dyn BeanPostProcessor>],
        bean: BeanRef,
        bean_name: &str,
    ) -> BeanResult<BeanRef> {
        let mut current_bean = bean;

        for processor in processors {
            current_bean = processor
                .post_process_before_initialization(current_bean, bean_name)
                .map_err(|source| hook_error(bean_name, processor.as_ref(), HookPhase::Before, source))?;
        }

        Ok(current_bean)
    }

    /// 应用 BeanPostProcessor.postProcessAfterInitialization
    fn apply_bean_post_processors_after_initialization(
        &self,
        processors: &[Arc<dyn BeanPostProcessor>],
        bean: BeanRef,
        bean_name: &str,
    ) -> BeanResult<BeanRef> {
        let mut current_bean = bean;

        for processor in processors {
            current_bean = processor
                .post_process_after_initialization(current_bean, bean_name)
                .map_err(|source| hook_error(bean_name, processor.as_ref(), HookPhase::After, source))?;
        }

        Ok(current_bean)
    }
}

/// 属性填充错误：循环依赖原样向上传递，其他错误包装为 Population
fn population_error(name: &str, error: anyhow::Error) -> BeanError {
    match error.downcast::<BeanError>() {
        Ok(circular @ BeanError::CircularDependency { .. }) => circular,
        Ok(other) => BeanError::Population {
            name: name.to_string(),
            source: other.into(),
        },
        Err(source) => BeanError::Population {
            name: name.to_string(),
            source,
        },
    }
}

fn hook_error(
    bean_name: &str,
    processor: &dyn BeanPostProcessor,
    phase: HookPhase,
    source: anyhow::Error,
) -> BeanError {
    BeanError::PostProcessor {
        name: bean_name.to_string(),
        processor: processor.name().to_string(),
        phase,
        source,
    }
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultListableBeanFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultListableBeanFactory")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("bean_definition_names", &*self.bean_definition_names.read())
            .field("bean_post_processors", &self.bean_post_processors.read().len())
            .field("configuration_frozen", &*self.configuration_frozen.read())
            .finish()
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> BeanResult<BeanRef> {
        tracing::trace!("Requesting bean: '{}'", name);

        let entry = self.entry(name)?;

        if let Some(bean) = entry.instance.get() {
            tracing::trace!("Returning cached instance of singleton bean '{}'", name);
            return Ok(Arc::clone(bean));
        }

        // 必须在进入 get_or_try_init 之前检查，同线程重入同一个 OnceCell 会死锁
        let _guard = self.creation_tracker.start_creating(name).map_err(|chain| {
            tracing::warn!("Circular dependency detected: {}", chain.join(" -> "));
            BeanError::CircularDependency { chain }
        })?;

        let bean = entry
            .instance
            .get_or_try_init(|| self.create_bean(name, &entry))?;

        Ok(Arc::clone(bean))
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names(&self) -> Vec<String> {
        self.bean_definition_names.read().clone()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }

    fn get_bean_names_for_type(&self, key: &TypeKey) -> Vec<String> {
        self.ordered_entries()
            .into_iter()
            .filter(|(_, entry)| entry.definition.descriptor.is_assignable_to(key))
            .map(|(name, _)| name)
            .collect()
    }

    fn get_beans_for_type(&self, key: &TypeKey) -> BeanResult<Vec<BeanRef>> {
        self.get_bean_names_for_type(key)
            .iter()
            .map(|name| self.get_bean(name))
            .collect()
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn register_bean_definition(&self, name: String, mut definition: BeanDefinition) -> BeanResult<()> {
        if name.trim().is_empty() {
            return Err(BeanError::InvalidBeanName(name));
        }

        // 检查配置是否已冻结
        if self.is_configuration_frozen() {
            tracing::warn!("Bean '{}' rejected: configuration is frozen", name);
            return Err(BeanError::ConfigurationFrozen(name));
        }

        definition.name = name.clone();

        tracing::trace!(
            "Attempting to register bean: name='{}', type='{}'",
            name,
            definition.type_name()
        );

        let mut definitions = self.definitions.write();

        if let Some(existing) = definitions.get(&name) {
            let created = existing.instance.get().is_some()
                || existing.state() == BeanState::InProgress;

            if !self.config.allow_definition_overriding || created {
                tracing::warn!("Bean '{}' already exists, registration failed", name);
                return Err(BeanError::BeanAlreadyExists(name));
            }

            // 覆盖定义，保留原来的注册顺序位置
            tracing::info!(
                "Overriding bean definition for '{}': {} -> {}",
                name,
                existing.definition.type_name(),
                definition.type_name()
            );
            definitions.insert(name, Arc::new(BeanEntry::new(definition)));
            return Ok(());
        }

        definitions.insert(name.clone(), Arc::new(BeanEntry::new(definition)));
        self.bean_definition_names.write().push(name.clone());

        tracing::debug!("Bean definition registered successfully: '{}'", name);
        Ok(())
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn get_bean_definition(&self, name: &str) -> BeanResult<BeanDefinition> {
        self.entry(name).map(|entry| entry.definition.clone())
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        if self.is_configuration_frozen() {
            tracing::warn!(
                "BeanPostProcessor '{}' added after the configuration was frozen; beans already created are not reprocessed",
                processor.name()
            );
        }

        let mut processors = self.bean_post_processors.write();
        tracing::debug!(
            "Registered BeanPostProcessor '{}' at position {}",
            processor.name(),
            processors.len()
        );
        processors.push(processor);
    }

    fn get_bean_post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.bean_post_processors.read().clone()
    }

    fn bean_state(&self, name: &str) -> Option<BeanState> {
        self.definitions.read().get(name).map(|entry| entry.state())
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn preinstantiate_singletons(&self) -> BeanResult<()> {
        let bean_names = self.get_bean_names();

        tracing::debug!("Pre-instantiating {} singleton beans", bean_names.len());

        for name in bean_names {
            self.get_bean(&name)?;
        }

        Ok(())
    }

    fn freeze_configuration(&self) {
        *self.configuration_frozen.write() = true;
        tracing::debug!("Bean factory configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        *self.configuration_frozen.read()
    }

    fn get_bean_dependencies(&self) -> HashMap<String, Vec<String>> {
        self.definitions
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.definition.dependencies()))
            .collect()
    }
}
