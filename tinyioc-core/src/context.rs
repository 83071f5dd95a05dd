use std::sync::Arc;

use parking_lot::Mutex;

use crate::bean_factory::{
    BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
use crate::{
    bean::{BeanDefinition, BeanRef, TypeKey},
    bean_post_processor::BeanPostProcessor,
    config::FactoryConfig,
    error::{ApplicationError, ApplicationResult, BeanError, BeanResult},
    reader::BeanDefinitionReader,
    utils::dependency::validate_dependency_graph,
};

/// 应用上下文 - 驱动整个启动流程
///
/// 持有 BeanFactory 和 Bean 定义读取器，`refresh()` 之后所有单例都已创建完毕
pub struct ApplicationContext {
    /// Bean 工厂 - 负责 Bean 的创建和管理
    bean_factory: Arc<DefaultListableBeanFactory>,

    /// Bean 定义读取器（refresh 时按顺序执行）
    readers: Vec<Box<dyn BeanDefinitionReader>>,

    /// 是否已经 refresh（只允许一次）
    refreshed: Mutex<bool>,

    /// 应用名称（用于日志）
    app_name: Option<String>,
}

impl ApplicationContext {
    /// 使用默认配置创建应用上下文
    pub fn new() -> Self {
        Self::with_factory(Arc::new(DefaultListableBeanFactory::new()))
    }

    /// 基于已有的 Bean 工厂创建应用上下文
    pub fn with_factory(bean_factory: Arc<DefaultListableBeanFactory>) -> Self {
        Self {
            bean_factory,
            readers: Vec::new(),
            refreshed: Mutex::new(false),
            app_name: None,
        }
    }

    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    /// 获取 BeanFactory
    pub fn bean_factory(&self) -> &Arc<DefaultListableBeanFactory> {
        &self.bean_factory
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn is_refreshed(&self) -> bool {
        *self.refreshed.lock()
    }

    /// 添加 Bean 定义读取器
    pub fn add_reader(&mut self, reader: Box<dyn BeanDefinitionReader>) {
        self.readers.push(reader);
    }

    /// 注册 Bean 定义（名称取自定义本身）
    pub fn register(&self, definition: BeanDefinition) -> BeanResult<()> {
        let name = definition.name.clone();
        self.bean_factory.register_bean_definition(name, definition)
    }

    /// 添加 BeanPostProcessor
    pub fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        self.bean_factory.add_bean_post_processor(processor);
    }

    /// 获取声明类型可以赋值给 `C` 的所有 Bean
    pub fn get_beans_of_type<C>(&self) -> BeanResult<Vec<Arc<C>>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.bean_factory.get_beans_of_type::<C>()
    }

    /// 启动容器
    ///
    /// 1. 执行所有 Bean 定义读取器
    /// 2. 校验声明的依赖（缺失的引用、循环引用），此时还没有创建任何 Bean
    /// 3. 找出实现了 BeanPostProcessor 的 Bean 并注册到工厂
    /// 4. 冻结配置
    /// 5. 预实例化所有单例
    ///
    /// 只能调用一次；失败后上下文不可再用
    pub fn refresh(&self) -> ApplicationResult<()> {
        {
            let mut refreshed = self.refreshed.lock();
            if *refreshed {
                return Err(ApplicationError::AlreadyRefreshed);
            }
            *refreshed = true;
        }

        match &self.app_name {
            Some(name) => tracing::info!("Refreshing application context '{}'", name),
            None => tracing::info!("Refreshing application context"),
        }

        // 1. 读取 Bean 定义
        for reader in &self.readers {
            let count = reader.load_bean_definitions(self.bean_factory.as_ref())?;
            tracing::debug!("Reader '{}' registered {} bean definition(s)", reader.name(), count);
        }

        // 2. 依赖校验
        self.validate_dependencies()?;

        // 3. 注册 BeanPostProcessor Bean
        self.register_bean_post_processors()?;

        // 4. 冻结配置
        self.bean_factory.freeze_configuration();

        // 5. 预实例化单例
        self.bean_factory.preinstantiate_singletons()?;

        tracing::info!(
            "Application context refreshed with {} bean(s) and {} post processor(s)",
            self.bean_factory.get_bean_definition_count(),
            self.bean_factory.get_bean_post_processors().len()
        );

        Ok(())
    }

    /// 验证依赖关系
    ///
    /// 检查以下问题：
    /// - 缺失的依赖（引用的 Bean 没有注册）
    /// - 循环依赖（A -> B -> C -> A）
    pub fn validate_dependencies(&self) -> BeanResult<()> {
        let dependency_map = self.bean_factory.get_bean_dependencies();

        validate_dependency_graph(&dependency_map)
            .map_err(|e| BeanError::DependencyValidation(e.to_string()))?;

        tracing::info!(
            "Dependency validation passed for {} bean(s)",
            dependency_map.len()
        );

        Ok(())
    }

    /// 找出所有 BeanPostProcessor Bean 并按注册顺序添加到工厂
    ///
    /// 处理器 Bean 在这里被创建，因此它们自己（以及它们引用的 Bean）不会经过处理器链
    fn register_bean_post_processors(&self) -> BeanResult<()> {
        let processors = self
            .bean_factory
            .get_beans_of_type::<dyn BeanPostProcessor>()?;

        if processors.is_empty() {
            tracing::debug!("No BeanPostProcessor beans found");
            return Ok(());
        }

        tracing::info!("Registering {} BeanPostProcessor bean(s)", processors.len());
        for processor in processors {
            tracing::debug!("  ├─ {}", processor.name());
            self.bean_factory.add_bean_post_processor(processor);
        }

        Ok(())
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("app_name", &self.app_name)
            .field("readers", &self.readers.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("refreshed", &self.is_refreshed())
            .field("bean_factory", &self.bean_factory)
            .finish()
    }
}

impl BeanFactory for ApplicationContext {
    fn get_bean(&self, name: &str) -> BeanResult<BeanRef> {
        self.bean_factory.get_bean(name)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_bean(name)
    }
}

impl ListableBeanFactory for ApplicationContext {
    fn get_bean_names(&self) -> Vec<String> {
        self.bean_factory.get_bean_names()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.bean_factory.get_bean_definition_count()
    }

    fn get_bean_names_for_type(&self, key: &TypeKey) -> Vec<String> {
        self.bean_factory.get_bean_names_for_type(key)
    }

    fn get_beans_for_type(&self, key: &TypeKey) -> BeanResult<Vec<BeanRef>> {
        self.bean_factory.get_beans_for_type(key)
    }
}

/// 应用上下文构建器
#[derive(Default)]
pub struct ApplicationContextBuilder {
    config: FactoryConfig,
    app_name: Option<String>,
    readers: Vec<Box<dyn BeanDefinitionReader>>,
    definitions: Vec<BeanDefinition>,
    post_processors: Vec<Arc<dyn BeanPostProcessor>>,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置工厂策略（定义覆盖、失败策略）
    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// 添加 Bean 定义读取器
    pub fn with_reader(mut self, reader: impl BeanDefinitionReader + 'static) -> Self {
        self.readers.push(Box::new(reader));
        self
    }

    /// 注册 Bean（名称取自定义本身）
    pub fn register(mut self, definition: BeanDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// 添加 BeanPostProcessor（排在 refresh 时发现的处理器 Bean 之前）
    pub fn add_bean_post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    pub fn build(self) -> ApplicationResult<Arc<ApplicationContext>> {
        let factory = Arc::new(DefaultListableBeanFactory::with_config(self.config));

        let mut context = ApplicationContext::with_factory(factory);
        context.app_name = self.app_name;
        context.readers = self.readers;

        for definition in self.definitions {
            context.register(definition)?;
        }
        for processor in self.post_processors {
            context.add_bean_post_processor(processor);
        }

        tracing::debug!(
            "Built application context with {} bean definition(s) and {} reader(s)",
            context.bean_factory.get_bean_definition_count(),
            context.readers.len()
        );

        Ok(Arc::new(context))
    }
}
