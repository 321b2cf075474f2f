//! Handler trait - Task を処理する Handler の定義
//!
//! - `Handler<T>`: 型付き。ユーザーが実装する
//! - `DynHandler`: object-safe。registry が `Arc<dyn DynHandler>` で保持する
//! - `TypedHandler<T, H>`: 前者を後者に変換する type erasure

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;

use super::task::Task;

/// Handler が返す業務エラー。
///
/// queue には `failed/` の `error` として記録されるだけで、呼び出し側には
/// 伝播しない。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// `DynHandler` 経由の dispatch が失敗した理由。
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("payload decode: {0}")]
    Decode(String),
    #[error("response encode: {0}")]
    Encode(String),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Handler は Task を処理して `T::Response` を返す
///
/// # 使用例
/// ```ignore
/// struct Planner;
///
/// #[async_trait]
/// impl Handler<PlanRequest> for Planner {
///     async fn handle(&self, task: PlanRequest) -> Result<Plan, HandlerError> {
///         Ok(Plan::for_task(&task.task))
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T) -> Result<T::Response, HandlerError>;
}

/// Object-safe な Handler
///
/// payload も返り値も `serde_json::Value` のまま扱う。
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: Value) -> Result<Value, DispatchError>;
    fn kind(&self) -> &'static str;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn(T)>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: Value) -> Result<Value, DispatchError> {
        let task: T =
            serde_json::from_value(payload).map_err(|e| DispatchError::Decode(e.to_string()))?;
        let response = self.handler.handle(task).await?;
        serde_json::to_value(response).map_err(|e| DispatchError::Encode(e.to_string()))
    }

    fn kind(&self) -> &'static str {
        T::KIND
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn typed_handler_round_trips_through_values() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let out = handler.handle_dyn(json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, json!("hi"));
        assert_eq!(handler.kind(), "test.echo.v1");
    }

    #[tokio::test]
    async fn bad_payload_is_a_decode_error() {
        let handler = TypedHandler::<Divide, _>::new(DivideHandler);
        let err = handler.handle_dyn(json!({"a": "x"})).await.unwrap_err();
        assert!(matches!(err, DispatchError::Decode(_)));
        assert!(err.to_string().starts_with("payload decode: "));
    }

    #[tokio::test]
    async fn handler_error_keeps_its_message() {
        let handler = TypedHandler::<Divide, _>::new(DivideHandler);
        let err = handler.handle_dyn(json!({"a": 1, "b": 0})).await.unwrap_err();
        assert_eq!(err.to_string(), "division by zero");
    }
}
