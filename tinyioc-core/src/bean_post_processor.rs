//! BeanPostProcessor - Bean 工厂扩展机制
//!
//! 提供在 Bean 初始化前后进行自定义处理的钩子，类似 Spring 的 BeanPostProcessor

use crate::bean::BeanRef;

/// BeanPostProcessor trait
///
/// 在 Bean 属性填充完成后，按注册顺序依次调用所有处理器的
/// `post_process_before_initialization`，再依次调用 `post_process_after_initialization`。
/// 每个钩子的返回值会替换当前实例，交给下一个钩子，最终结果被缓存。
///
/// 使用场景：
/// - 代理/包装
/// - 校验
/// - 属性增强
///
/// 处理器本身也可以注册为 Bean：ApplicationContext 在 refresh 时会找出所有
/// 声明了 `implements::<dyn BeanPostProcessor>` 的 Bean 并注册到工厂。
///
/// # 示例
///
/// ```ignore
/// use tinyioc_core::prelude::*;
///
/// #[derive(Default)]
/// pub struct LoggingBeanPostProcessor;
///
/// impl BeanPostProcessor for LoggingBeanPostProcessor {
///     fn post_process_after_initialization(
///         &self,
///         bean: BeanRef,
///         bean_name: &str,
///     ) -> anyhow::Result<BeanRef> {
///         tracing::info!("After initialization: {}", bean_name);
///         Ok(bean)
///     }
/// }
/// ```
pub trait BeanPostProcessor: Send + Sync {
    /// 在 Bean 属性填充之后、after 钩子之前调用
    ///
    /// # 返回
    /// 返回处理后的 Bean 实例（可以是原始 Bean，也可以是包装后的 Bean）
    fn post_process_before_initialization(
        &self,
        bean: BeanRef,
        _bean_name: &str,
    ) -> anyhow::Result<BeanRef> {
        Ok(bean)
    }

    /// 在所有 before 钩子之后调用
    ///
    /// # 典型用途
    /// - 创建代理
    /// - 包装 Bean
    fn post_process_after_initialization(
        &self,
        bean: BeanRef,
        _bean_name: &str,
    ) -> anyhow::Result<BeanRef> {
        Ok(bean)
    }

    /// 获取处理器的名称（用于日志和错误信息）
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
