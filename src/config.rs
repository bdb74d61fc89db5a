//! 設定管理
//!
//! 環境変数からオークションサービスの設定を読み込む。

use std::env;

/// オークションサービス設定
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTPサーバーポート
    pub port: u16,
    /// 入札クールダウン秒数（オークション全体で共有）
    pub bid_cooldown_sec: u64,
    /// ライフサイクル掃引の間隔（ミリ秒）
    pub sweep_interval_ms: u64,
    /// OTPの有効期限（秒）
    pub otp_ttl_sec: u64,
    /// 落札後の支払い猶予（秒）
    pub payment_window_sec: u64,
    /// 未払いペナルティの料率（%）
    pub penalty_rate_pct: u64,
    /// 参加禁止となる未払い回数
    pub strike_limit: u32,
    /// 支払い期限切れ後、カートホールドを掃除するまでの猶予（秒）
    pub stale_hold_ttl_sec: u64,
    /// イベント配信チャンネルの容量
    pub event_channel_capacity: usize,
}

impl Config {
    /// 環境変数から設定を読み込む
    ///
    /// - AUCTION_PORT (デフォルト: 8082)
    /// - BID_COOLDOWN_SEC (デフォルト: 60)
    /// - SWEEP_INTERVAL_MS (デフォルト: 1000)
    /// - OTP_TTL_SEC (デフォルト: 600)
    /// - PAYMENT_WINDOW_SEC (デフォルト: 86400)
    /// - PENALTY_RATE_PCT (デフォルト: 10)
    /// - STRIKE_LIMIT (デフォルト: 3)
    /// - STALE_HOLD_TTL_SEC (デフォルト: 259200)
    /// - EVENT_CHANNEL_CAPACITY (デフォルト: 1000)
    pub fn from_env() -> Self {
        // .envファイルがあれば読み込む（無くてもエラーにしない）
        let _ = dotenvy::dotenv();

        Self {
            port: env::var("AUCTION_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8082),
            bid_cooldown_sec: env::var("BID_COOLDOWN_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            sweep_interval_ms: env::var("SWEEP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(1000),
            otp_ttl_sec: env::var("OTP_TTL_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(600),
            payment_window_sec: env::var("PAYMENT_WINDOW_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(86_400),
            penalty_rate_pct: env::var("PENALTY_RATE_PCT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(10),
            strike_limit: env::var("STRIKE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(3),
            stale_hold_ttl_sec: env::var("STALE_HOLD_TTL_SEC")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(259_200),
            event_channel_capacity: env::var("EVENT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(1000),
        }
    }
}
