//! カートホールドストア
//!
//! 在庫ユニット1件につき最大1件のホールドを保持する。書き込みは精算
//! エンジンからのみ。ユニットIDをキーにするため「既存ホールドの置換」は
//! 単純なinsertで表現できる。
//! チェックアウトで消費されたホールドはオークションID単位で記録する。
//! 期限切れ掃除による削除と区別するためで、支払い状況の導出が参照する。

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// カートホールド（落札者向けの在庫予約）
#[derive(Debug, Clone)]
pub struct CartHold {
    pub unit_id: String,
    pub user_id: String,
    pub auction_id: String,
    pub amount: u64,
    pub created_at_ms: u64,
}

/// インメモリカートストア
pub struct CartStore {
    holds: RwLock<HashMap<String, CartHold>>,
    checked_out: RwLock<HashSet<String>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self {
            holds: RwLock::new(HashMap::new()),
            checked_out: RwLock::new(HashSet::new()),
        }
    }

    /// ホールドを作成し、同一ユニットの既存ホールドがあれば置換する。
    /// 戻り値は置換された旧ホールド。
    pub fn replace_hold(&self, hold: CartHold) -> Option<CartHold> {
        self.holds
            .write()
            .unwrap()
            .insert(hold.unit_id.clone(), hold)
    }

    pub fn hold_for_unit(&self, unit_id: &str) -> Option<CartHold> {
        self.holds.read().unwrap().get(unit_id).cloned()
    }

    /// チェックアウト完了でホールドを消費する。消費したオークションIDを
    /// 記録する（期限切れ掃除による削除とはここで区別される）。
    pub fn consume_hold(&self, unit_id: &str) -> Option<CartHold> {
        let hold = self.holds.write().unwrap().remove(unit_id)?;
        self.checked_out
            .write()
            .unwrap()
            .insert(hold.auction_id.clone());
        Some(hold)
    }

    /// このオークションのホールドがチェックアウトで消費済みかどうか
    pub fn was_checked_out(&self, auction_id: &str) -> bool {
        self.checked_out.read().unwrap().contains(auction_id)
    }

    /// cutoffより前に作られたホールドをまとめて破棄し、件数を返す
    pub fn remove_created_before(&self, cutoff_ms: u64) -> usize {
        let mut holds = self.holds.write().unwrap();
        let before = holds.len();
        holds.retain(|_, hold| hold.created_at_ms >= cutoff_ms);
        before - holds.len()
    }

    pub fn count(&self) -> usize {
        self.holds.read().unwrap().len()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(unit: &str, user: &str, created: u64) -> CartHold {
        CartHold {
            unit_id: unit.into(),
            user_id: user.into(),
            auction_id: "a1".into(),
            amount: 1_000,
            created_at_ms: created,
        }
    }

    #[test]
    fn test_replace_hold() {
        let store = CartStore::new();
        assert!(store.replace_hold(hold("unit_1", "u1", 10)).is_none());

        // 同一ユニットへの再ホールドはマージではなく置換
        let prior = store.replace_hold(hold("unit_1", "u2", 20)).unwrap();
        assert_eq!(prior.user_id, "u1");
        assert_eq!(store.hold_for_unit("unit_1").unwrap().user_id, "u2");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_remove_created_before() {
        let store = CartStore::new();
        store.replace_hold(hold("unit_1", "u1", 10));
        store.replace_hold(hold("unit_2", "u2", 50));

        assert_eq!(store.remove_created_before(30), 1);
        assert!(store.hold_for_unit("unit_1").is_none());
        assert!(store.hold_for_unit("unit_2").is_some());
    }

    #[test]
    fn test_consume_records_checkout_but_cleanup_does_not() {
        let store = CartStore::new();
        store.replace_hold(hold("unit_1", "u1", 10));
        store.replace_hold(hold("unit_2", "u2", 10));

        // チェックアウト消費は記録される
        assert!(store.consume_hold("unit_1").is_some());
        assert!(store.was_checked_out("a1"));

        // 期限切れ掃除での削除は消費扱いにならない
        let mut expired = hold("unit_2", "u2", 10);
        expired.auction_id = "a2".into();
        store.replace_hold(expired);
        assert_eq!(store.remove_created_before(30), 1);
        assert!(!store.was_checked_out("a2"));

        // 既に消えたホールドの再消費は記録を増やさない
        assert!(store.consume_hold("unit_2").is_none());
        assert!(!store.was_checked_out("a2"));
    }
}
