//! メール通知クライアント
//!
//! 外部メーラーへのbest-effort送信。テンプレート展開はメーラー側の責務で、
//! ここからはテンプレート名とパラメータをJSONで渡すだけ。送信失敗は
//! ログとカウンタに残すのみで、呼び出し元の処理を失敗させない。

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// メーラーへ渡す送信リクエスト
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailRequest {
    pub to_user_id: String,
    pub template: String,
    pub params: serde_json::Value,
}

/// メール通知クライアント
pub struct MailNotifier {
    enabled: bool,
    endpoint: String,
    client: reqwest::Client,
    stats: Arc<MailStats>,
}

impl MailNotifier {
    /// 環境変数から初期化
    ///
    /// - MAILER_ENABLE: "1" / "true" で有効化
    /// - MAILER_URL: メーラーの送信エンドポイント
    pub fn from_env() -> Self {
        let enabled = std::env::var("MAILER_ENABLE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let endpoint =
            std::env::var("MAILER_URL").unwrap_or_else(|_| "http://localhost:8025/send".into());

        Self {
            enabled,
            endpoint,
            client: reqwest::Client::new(),
            stats: Arc::new(MailStats::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// テンプレートメールを送信する（fire-and-forget）。
    /// 実送信は別タスクで行い、呼び出し元はブロックしない。
    pub fn send(&self, to_user_id: &str, template: &str, params: serde_json::Value) {
        if !self.enabled {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let request = MailRequest {
            to_user_id: to_user_id.to_string(),
            template: template.to_string(),
            params,
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let stats = Arc::clone(&self.stats);
        stats.queued.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            match client.post(&endpoint).json(&request).send().await {
                Ok(resp) if resp.status().is_success() => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Ok(resp) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        status = %resp.status(),
                        template = %request.template,
                        "mailer rejected request"
                    );
                }
                Err(err) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, template = %request.template, "mail send failed");
                }
            }
        });
    }

    pub fn metrics(&self) -> MailMetrics {
        MailMetrics {
            enabled: self.enabled,
            queued: self.stats.queued.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

pub struct MailMetrics {
    pub enabled: bool,
    pub queued: u64,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

struct MailStats {
    queued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl MailStats {
    fn new() -> Self {
        Self {
            queued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_counts_drops() {
        let notifier = MailNotifier {
            enabled: false,
            endpoint: "http://localhost:0/send".into(),
            client: reqwest::Client::new(),
            stats: Arc::new(MailStats::new()),
        };

        notifier.send("u1", "auction_won", serde_json::json!({"price": 100}));

        let metrics = notifier.metrics();
        assert!(!metrics.enabled);
        assert_eq!(metrics.dropped, 1);
        assert_eq!(metrics.queued, 0);
    }
}
