//! 演示用的 BeanPostProcessor，在 beans.toml 中声明为普通 Bean，
//! refresh 时被自动发现并注册

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tinyioc_core::prelude::*;

/// 在 Bean 初始化前后记录日志
#[derive(Debug, Default)]
pub struct LoggingBeanPostProcessor;

impl LoggingBeanPostProcessor {
    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder(|| Ok(LoggingBeanPostProcessor))
            .implements::<dyn BeanPostProcessor>(|p| p as Arc<dyn BeanPostProcessor>)
            .build()
    }
}

impl BeanPostProcessor for LoggingBeanPostProcessor {
    fn name(&self) -> &str {
        "LoggingBeanPostProcessor"
    }

    fn post_process_before_initialization(&self, bean: BeanRef, bean_name: &str) -> Result<BeanRef> {
        tracing::debug!("📦 [BeanPostProcessor] Before initialization: '{}'", bean_name);
        Ok(bean)
    }

    fn post_process_after_initialization(&self, bean: BeanRef, bean_name: &str) -> Result<BeanRef> {
        tracing::info!("✅ [BeanPostProcessor] Bean '{}' initialized successfully", bean_name);
        Ok(bean)
    }
}

/// 统计每个 Bean 在钩子链中停留的时间
#[derive(Debug, Default)]
pub struct TimingBeanPostProcessor {
    start_times: Mutex<HashMap<String, Instant>>,
}

impl TimingBeanPostProcessor {
    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder(|| Ok(TimingBeanPostProcessor::default()))
            .implements::<dyn BeanPostProcessor>(|p| p as Arc<dyn BeanPostProcessor>)
            .build()
    }
}

impl BeanPostProcessor for TimingBeanPostProcessor {
    fn name(&self) -> &str {
        "TimingBeanPostProcessor"
    }

    fn post_process_before_initialization(&self, bean: BeanRef, bean_name: &str) -> Result<BeanRef> {
        self.start_times
            .lock()
            .insert(bean_name.to_string(), Instant::now());
        Ok(bean)
    }

    fn post_process_after_initialization(&self, bean: BeanRef, bean_name: &str) -> Result<BeanRef> {
        if let Some(start_time) = self.start_times.lock().remove(bean_name) {
            let elapsed = start_time.elapsed();
            if elapsed.as_millis() > 10 {
                tracing::warn!(
                    "⏱️  [BeanPostProcessor] Bean '{}' took {}ms to initialize (slow!)",
                    bean_name,
                    elapsed.as_millis()
                );
            } else {
                tracing::debug!(
                    "⏱️  [BeanPostProcessor] Bean '{}' initialized in {}µs",
                    bean_name,
                    elapsed.as_micros()
                );
            }
        }
        Ok(bean)
    }
}
