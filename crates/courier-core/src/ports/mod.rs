//! Ports - 抽象化レイヤー
//!
//! queue の外側にある関心事（時刻、ID 生成、document の encoding）を trait で切り出す。
//! ファイルシステム自体は port にしない。directory layout と atomic rename が
//! このクレートの契約そのものなので、store モジュールが直接扱う。

pub mod clock;
pub mod codec;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{Codec, JsonCodec};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator, UlidGenerator};
