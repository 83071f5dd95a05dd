mod processors;
mod service;

use std::path::Path;
use std::sync::Arc;

use tinyioc_core::prelude::*;
use tinyioc_core::DEFAULT_CONFIG_FILE;

use processors::{LoggingBeanPostProcessor, TimingBeanPostProcessor};
use service::{GreetingRepository, GreetingService};

/// 依次尝试的路径（工作区根目录或 demo 目录下运行）
fn locate(file: &str) -> String {
    let candidates = [format!("demos/app-demo/{}", file), file.to_string()];
    candidates
        .iter()
        .find(|path| Path::new(path.as_str()).exists())
        .cloned()
        .unwrap_or_else(|| file.to_string())
}

fn type_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_default::<GreetingRepository>()
        .register("GreetingService", GreetingService::descriptor())
        .register("LoggingBeanPostProcessor", LoggingBeanPostProcessor::descriptor())
        .register("TimingBeanPostProcessor", TimingBeanPostProcessor::descriptor());
    registry
}

fn main() -> anyhow::Result<()> {
    let config = ContainerConfig::load_or_default(locate(DEFAULT_CONFIG_FILE))?.with_env_overrides()?;
    config.logging.clone().init()?;

    tracing::info!("Starting app-demo with {:?}", config.factory);

    let reader = TomlBeanDefinitionReader::from_file(locate("beans.toml"), Arc::new(type_registry()))?;

    let context = ApplicationContext::builder()
        .app_name("app-demo")
        .with_config(config.factory)
        .with_reader(reader)
        .build()?;

    context.refresh()?;

    let repository = context.get_bean_as::<GreetingRepository>("greetingRepository")?;
    repository.save("zh", "你好");
    repository.save("fr", "Bonjour");

    let service = context.get_bean_as::<GreetingService>("greetingService")?;
    for language in service.languages() {
        println!("{}", service.greet(language, "tinyioc"));
    }

    let processors = context.get_beans_of_type::<dyn BeanPostProcessor>()?;
    tracing::info!(
        "Registered post processors: {:?}",
        processors.iter().map(|p| p.name()).collect::<Vec<_>>()
    );

    match context.get_bean("missingBean") {
        Err(BeanError::UnknownBeanName(name)) => {
            tracing::info!("Lookup of unknown bean '{}' rejected as expected", name)
        }
        other => anyhow::bail!("unexpected lookup result: {:?}", other.map(|_| ())),
    }

    Ok(())
}
