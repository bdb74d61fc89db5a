//! カタログストア（読み取りモデル）
//!
//! オークション対象ユニットの基準価格・刻み幅・表示名を保持する。
//! カタログ管理そのものはこのサブシステムの範囲外で、ここでは
//! オークション登録時に必要な属性だけを持つ。

use std::collections::HashMap;
use std::sync::RwLock;

/// カタログユニット
#[derive(Debug, Clone)]
pub struct CatalogUnit {
    pub unit_id: String,
    pub title: String,
    pub base_price: u64,
    pub price_step: u64,
}

/// インメモリカタログストア
pub struct CatalogStore {
    units: RwLock<HashMap<String, CatalogUnit>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, unit: CatalogUnit) {
        self.units
            .write()
            .unwrap()
            .insert(unit.unit_id.clone(), unit);
    }

    pub fn get(&self, unit_id: &str) -> Option<CatalogUnit> {
        self.units.read().unwrap().get(unit_id).cloned()
    }

    /// メール本文などで使う表示名。未登録ならユニットIDを流用する。
    pub fn title_of(&self, unit_id: &str) -> String {
        self.get(unit_id)
            .map(|u| u.title)
            .unwrap_or_else(|| unit_id.to_string())
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_title() {
        let store = CatalogStore::new();
        store.put(CatalogUnit {
            unit_id: "unit_1".into(),
            title: "Limited Sneaker".into(),
            base_price: 1_000_000,
            price_step: 100_000,
        });

        assert_eq!(store.get("unit_1").unwrap().base_price, 1_000_000);
        assert_eq!(store.title_of("unit_1"), "Limited Sneaker");
        assert_eq!(store.title_of("unknown"), "unknown");
    }
}
