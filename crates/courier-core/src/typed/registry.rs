//! TypedRegistry - kind → Handler の対応表
//!
//! - `register::<T, H>()` で型付き Handler を登録
//! - 内部では `TypedHandler` でラップして `Arc<dyn DynHandler>` で保持

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::task::Task;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("handler for kind '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// # 使用例
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<PlanRequest, _>(Planner)?;
///
/// let handler = registry.get("plan-request");
/// ```
#[derive(Default, Clone)]
pub struct TypedRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        let kind = T::KIND.to_string();
        if self.handlers.contains_key(&kind) {
            return Err(RegistryError::AlreadyRegistered(kind));
        }
        self.handlers
            .insert(kind, Arc::new(TypedHandler::<T, H>::new(handler)));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// 登録済み kind（ソート済み）
    pub fn registered_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for TypedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRegistry")
            .field("kinds", &self.registered_kinds())
            .finish()
    }
}
