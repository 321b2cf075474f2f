//! Codec port - document のエンコード方式の抽象化
//!
//! queue は encoding に依存しない。ファイル拡張子も codec が決める。
//! 必要なのは encode/decode が lossless に往復することだけ。

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::QueueError;

/// Codec converts structured documents to and from file bytes.
///
/// Object-safe on purpose: the queue holds an `Arc<dyn Codec>`. Typed
/// helpers (`encode_as`, `decode_as`) go through `serde_json::Value`.
pub trait Codec: Send + Sync {
    /// File extension, without the dot.
    fn extension(&self) -> &str;

    fn encode(&self, doc: &serde_json::Value) -> Result<Vec<u8>, QueueError>;

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, QueueError>;
}

impl dyn Codec {
    pub fn encode_as<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, QueueError> {
        let doc = serde_json::to_value(value).map_err(|e| QueueError::Encode(e.to_string()))?;
        self.encode(&doc)
    }

    pub fn decode_as<T: DeserializeOwned>(&self, bytes: &[u8], context: &str) -> Result<T, QueueError> {
        let doc = self.decode(bytes).map_err(|e| match e {
            QueueError::Decode { message, .. } => QueueError::decode(context, message),
            other => other,
        })?;
        serde_json::from_value(doc).map_err(|e| QueueError::decode(context, e))
    }
}

/// Pretty-printed JSON, `.json` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn extension(&self) -> &str {
        "json"
    }

    fn encode(&self, doc: &serde_json::Value) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec_pretty(doc).map_err(|e| QueueError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, QueueError> {
        serde_json::from_slice(bytes).map_err(|e| QueueError::decode("json", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CorrelationId, QueueItem};
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn json_codec_round_trips_items() {
        let codec: Box<dyn Codec> = Box::new(JsonCodec);
        let item = QueueItem::new(
            CorrelationId::new("x-1").unwrap(),
            Utc::now(),
            "analysis-request",
            json!({"nested": {"list": [1, 2, 3]}, "s": "é"}),
        )
        .with_priority(Some(3));

        let bytes = codec.encode_as(&item).unwrap();
        let back: QueueItem = codec.decode_as(&bytes, "test").unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let codec: Box<dyn Codec> = Box::new(JsonCodec);
        let err = codec.decode_as::<QueueItem>(b"{not json", "pending/x.json").unwrap_err();
        assert!(matches!(err, QueueError::Decode { .. }));
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let codec: Box<dyn Codec> = Box::new(JsonCodec);
        let err = codec
            .decode_as::<QueueItem>(br#"{"id": "x"}"#, "pending/x.json")
            .unwrap_err();
        match err {
            QueueError::Decode { context, .. } => assert_eq!(context, "pending/x.json"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
