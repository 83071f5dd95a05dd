//! 业务服务 - 通过 beans.toml 装配

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tinyioc_core::prelude::*;

/// 问候语存储
#[derive(Debug, Default)]
pub struct GreetingRepository {
    greetings: RwLock<HashMap<String, String>>,
}

impl GreetingRepository {
    pub fn save(&self, language: &str, greeting: &str) {
        self.greetings
            .write()
            .insert(language.to_string(), greeting.to_string());
    }

    pub fn find(&self, language: &str) -> Option<String> {
        self.greetings.read().get(language).cloned()
    }
}

/// 问候服务 - 依赖 GreetingRepository
#[derive(Debug, Default)]
pub struct GreetingService {
    default_greeting: String,
    languages: Vec<String>,
    repository: Option<Arc<GreetingRepository>>,
}

impl GreetingService {
    pub fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder(|| Ok(GreetingService::default()))
            .property("default-greeting", |s: &mut GreetingService, v| {
                s.default_greeting = v
                    .as_str()
                    .ok_or_else(|| anyhow!("default-greeting must be a string"))?
                    .to_string();
                Ok(())
            })
            .property("languages", |s: &mut GreetingService, v| {
                s.languages = v
                    .as_string_array()
                    .ok_or_else(|| anyhow!("languages must be a list of strings"))?;
                Ok(())
            })
            .reference("repository", |s: &mut GreetingService, r: Arc<GreetingRepository>| {
                s.repository = Some(r);
            })
            .build()
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn greet(&self, language: &str, name: &str) -> String {
        let greeting = self
            .repository
            .as_ref()
            .and_then(|repository| repository.find(language))
            .unwrap_or_else(|| self.default_greeting.clone());
        format!("{}, {}!", greeting, name)
    }
}
