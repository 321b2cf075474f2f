//! IdGenerator port - correlation ID 生成の抽象化
//!
//! # 実装
//! - **SequentialIdGenerator**: timestamp + プロセス内カウンタ + salt（デフォルト）
//! - **UlidGenerator**: ULID ベース
//!
//! どちらも queue handle が所有する値として注入する。static な状態は持たない。

use std::sync::Mutex;

use ulid::Ulid;

use crate::domain::CorrelationId;
use crate::ports::Clock;

/// IdGenerator は queue item の correlation ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
/// - 生成は失敗しない
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> CorrelationId;
}

/// `<timestamp>-<counter>-<salt>` 形式の ID を生成
///
/// - timestamp: UTC, millisecond resolution (`20261017T101530123`)
/// - counter: process-local, guarded by a mutex, 6 digits (wraps past 999999)
/// - salt: 16 hex digits (64 random bits) drawn once per generator so two
///   processes writing in the same millisecond with the same counter value
///   still differ
///
/// Within one generator ids sort by creation order.
pub struct SequentialIdGenerator<C> {
    clock: C,
    salt: u64,
    counter: Mutex<u64>,
}

impl<C: Clock> SequentialIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self::with_salt(clock, rand::random())
    }

    /// Fixed salt, for deterministic ids in tests.
    pub fn with_salt(clock: C, salt: u64) -> Self {
        Self {
            clock,
            salt,
            counter: Mutex::new(0),
        }
    }
}

impl<C: Clock> IdGenerator for SequentialIdGenerator<C> {
    fn next_id(&self) -> CorrelationId {
        // カウンタと時刻を同じロック内で取ることで、同一プロセス内の順序を保つ
        let mut counter = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        *counter += 1;
        let seq = *counter % 1_000_000;
        let stamp = self.clock.now().format("%Y%m%dT%H%M%S%3f");
        let raw = format!("{stamp}-{seq:06}-{:016x}", self.salt);
        drop(counter);

        CorrelationId::from_generated(raw)
    }
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// FixedClock を渡すと timestamp 部分が固定され、ランダム部分だけが変わる。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_id(&self) -> CorrelationId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        // Crockford base32 の 26 文字なので常に有効
        CorrelationId::from_generated(ulid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn sequential_ids_embed_time_counter_and_salt() {
        let t = Utc.with_ymd_and_hms(2026, 10, 17, 10, 15, 30).unwrap();
        let id_gen = SequentialIdGenerator::with_salt(FixedClock::new(t), 0x9f3a);

        assert_eq!(id_gen.next_id().as_str(), "20261017T101530000-000001-0000000000009f3a");
        assert_eq!(id_gen.next_id().as_str(), "20261017T101530000-000002-0000000000009f3a");
    }

    #[test]
    fn sequential_ids_sort_by_creation_order() {
        let id_gen = SequentialIdGenerator::new(SystemClock);
        let ids: Vec<_> = (0..50).map(|_| id_gen.next_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn sequential_ids_are_unique_across_threads() {
        let id_gen = Arc::new(SequentialIdGenerator::new(SystemClock));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let id_gen = Arc::clone(&id_gen);
                std::thread::spawn(move || (0..200).map(|_| id_gen.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 8 * 200);
    }

    #[test]
    fn generators_with_different_salts_do_not_collide() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = SequentialIdGenerator::with_salt(FixedClock::new(t), 1);
        let b = SequentialIdGenerator::with_salt(FixedClock::new(t), 2);
        assert_ne!(a.next_id(), b.next_id());
    }

    #[test]
    fn independent_generators_on_the_same_clock_do_not_collide() {
        // 同じミリ秒・同じカウンタで走る別プロセス相当
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            let id_gen = SequentialIdGenerator::new(FixedClock::new(t));
            assert!(seen.insert(id_gen.next_id()), "duplicate id across generators");
        }
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.next_id();
        let id2 = id_gen.next_id();
        assert_ne!(id1, id2);

        let u1: Ulid = id1.as_str().parse().unwrap();
        let u2: Ulid = id2.as_str().parse().unwrap();
        assert_eq!(u1.timestamp_ms(), u2.timestamp_ms());
        assert_eq!(u1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
