//! オークション単位の入札クールダウン
//!
//! 直近の受理入札からBID_COOLDOWN_SECが経過するまで、そのオークションへの
//! 入札を全員分ブロックする。入札者単位ではなくオークション単位の
//! スロットルである点に注意（スナイピング抑止の仕様をそのまま保持）。

use dashmap::DashMap;

/// オークションごとの最終受理時刻を持つクールダウンマップ
pub struct BidCooldown {
    window_ms: u64,
    last_accept_ms: DashMap<String, u64>,
}

impl BidCooldown {
    pub fn new(window_sec: u64) -> Self {
        Self {
            window_ms: window_sec.saturating_mul(1000),
            last_accept_ms: DashMap::new(),
        }
    }

    /// クールダウン中なら残り秒数を返す。受付可能ならNone。
    pub fn seconds_left(&self, auction_id: &str, now_ms: u64) -> Option<u64> {
        if self.window_ms == 0 {
            return None;
        }
        let last = self.last_accept_ms.get(auction_id).map(|v| *v)?;
        let open_at = last.saturating_add(self.window_ms);
        if now_ms >= open_at {
            return None;
        }
        // 端数は切り上げて「あと何秒」で返す
        Some((open_at - now_ms).div_ceil(1000))
    }

    /// 入札受理を記録し、ウィンドウを張り直す
    pub fn record_accept(&self, auction_id: &str, now_ms: u64) {
        self.last_accept_ms.insert(auction_id.to_string(), now_ms);
    }

    /// 終了したオークションのエントリを掃除する
    pub fn clear(&self, auction_id: &str) {
        self.last_accept_ms.remove(auction_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_opens_after_cooldown() {
        let cooldown = BidCooldown::new(60);
        assert!(cooldown.seconds_left("a1", 1_000).is_none());

        cooldown.record_accept("a1", 1_000);
        assert_eq!(cooldown.seconds_left("a1", 1_000), Some(60));
        assert_eq!(cooldown.seconds_left("a1", 31_500), Some(30));
        assert!(cooldown.seconds_left("a1", 61_000).is_none());

        // 別オークションには影響しない
        assert!(cooldown.seconds_left("a2", 1_000).is_none());
    }

    #[test]
    fn test_zero_window_disables_throttle() {
        let cooldown = BidCooldown::new(0);
        cooldown.record_accept("a1", 1_000);
        assert!(cooldown.seconds_left("a1", 1_000).is_none());
    }

    #[test]
    fn test_clear() {
        let cooldown = BidCooldown::new(60);
        cooldown.record_accept("a1", 1_000);
        cooldown.clear("a1");
        assert!(cooldown.seconds_left("a1", 1_001).is_none());
    }
}
