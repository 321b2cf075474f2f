//! Task trait - kind 文字列と型の対応付け
//!
//! kind の typo を型で排除する。producer は `FsQueue::submit`、consumer は
//! `TypedRegistry::register` で同じ `T::KIND` を使う。

use serde::Serialize;
use serde::de::DeserializeOwned;

/// 型付きの queue item。
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct PlanRequest {
///     task: String,
/// }
///
/// impl Task for PlanRequest {
///     const KIND: &'static str = "plan-request";
///     type Response = Plan;
/// }
/// ```
///
/// # Trait Bounds
/// - `Serialize` / `DeserializeOwned`: payload として codec を通るため
/// - `Send + Sync + 'static`: handler を `Arc` に格納し spawn するため
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// item の `kind` フィールド。
    ///
    /// # 命名規約
    /// - 小文字 + `-` / `.` 区切り
    /// - 例: `plan-request`, `acme.billing.charge.v1`
    const KIND: &'static str;

    /// handler の返り値。completed の `result` と response artifact になる
    type Response: Serialize + DeserializeOwned + Send + 'static;
}
