//! Typed - 型付き Task API
//!
//! kind の typo を型で排除し、Handler との対応付けを静的に保証する。
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure
//!
//! queue 本体（`store`）は kind を文字列としてしか知らない。

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DispatchError, DynHandler, Handler, HandlerError, TypedHandler};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::Task;
