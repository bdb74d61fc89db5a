//! 入場ゲート（ワンタイムコード）
//!
//! オークション参加前にメールで届く6桁コードの発行・検証を行う。
//! コードは発行からOTP_TTL_SECで失効し、検証は成否に関わらず1回で
//! 消費される（総当たり防止）。恒久BANユーザーには発行しない。

use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tracing::info;

use crate::notifier::MailNotifier;
use crate::store::{now_millis, UserStore};

/// 発行済みコード
#[derive(Debug, Clone)]
struct OtpRecord {
    code: String,
    expires_at_ms: u64,
}

/// 発行拒否理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryReject {
    /// 未払い回数が上限に達している
    PermanentlyBanned,
    /// コード未発行・失効・不一致。区別して返さない。
    InvalidCode,
}

impl EntryReject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermanentlyBanned => "PERMANENTLY_BANNED",
            Self::InvalidCode => "INVALID_CODE",
        }
    }
}

/// 入場ゲート
pub struct EntryGate {
    users: Arc<UserStore>,
    mailer: Arc<MailNotifier>,
    codes: DashMap<String, OtpRecord>,
    cleared: DashMap<String, u64>,
    ttl_ms: u64,
    strike_limit: u32,
}

impl EntryGate {
    pub fn new(
        users: Arc<UserStore>,
        mailer: Arc<MailNotifier>,
        otp_ttl_sec: u64,
        strike_limit: u32,
    ) -> Self {
        Self {
            users,
            mailer,
            codes: DashMap::new(),
            cleared: DashMap::new(),
            ttl_ms: otp_ttl_sec.saturating_mul(1000),
            strike_limit,
        }
    }

    /// 入場コードを発行してメールで送る。再発行は旧コードを置換する。
    pub fn request_code(&self, user_id: &str) -> Result<(), EntryReject> {
        if self.users.payment_failures(user_id) >= self.strike_limit {
            return Err(EntryReject::PermanentlyBanned);
        }

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
        let expires_at_ms = now_millis().saturating_add(self.ttl_ms);
        self.codes.insert(
            user_id.to_string(),
            OtpRecord {
                code: code.clone(),
                expires_at_ms,
            },
        );

        info!(user_id = %user_id, "entry code issued");
        self.mailer.send(
            user_id,
            "entry_code",
            serde_json::json!({
                "code": code,
                "ttlSec": self.ttl_ms / 1000,
            }),
        );
        Ok(())
    }

    /// コードを検証する。発行済みコードは成否に関わらずここで消費される。
    pub fn verify_code(&self, user_id: &str, code: &str) -> Result<(), EntryReject> {
        let (_, record) = self
            .codes
            .remove(user_id)
            .ok_or(EntryReject::InvalidCode)?;

        if now_millis() >= record.expires_at_ms || record.code != code {
            return Err(EntryReject::InvalidCode);
        }

        self.cleared.insert(user_id.to_string(), now_millis());
        info!(user_id = %user_id, "entry verified");
        Ok(())
    }

    /// 入場検証済みか
    pub fn is_cleared(&self, user_id: &str) -> bool {
        self.cleared.contains_key(user_id)
    }

    #[cfg(test)]
    fn issued_code(&self, user_id: &str) -> Option<String> {
        self.codes.get(user_id).map(|r| r.code.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> EntryGate {
        EntryGate::new(
            Arc::new(UserStore::new()),
            Arc::new(MailNotifier::from_env()),
            600,
            3,
        )
    }

    #[tokio::test]
    async fn test_request_then_verify() {
        let gate = gate();
        gate.request_code("u1").unwrap();
        let code = gate.issued_code("u1").unwrap();
        assert_eq!(code.len(), 6);

        assert!(!gate.is_cleared("u1"));
        gate.verify_code("u1", &code).unwrap();
        assert!(gate.is_cleared("u1"));
    }

    #[tokio::test]
    async fn test_wrong_code_consumes_issue() {
        let gate = gate();
        gate.request_code("u1").unwrap();
        let code = gate.issued_code("u1").unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert_eq!(gate.verify_code("u1", wrong), Err(EntryReject::InvalidCode));
        // 1回の失敗でコードは消費済み。正しいコードでも通らない。
        assert_eq!(
            gate.verify_code("u1", &code),
            Err(EntryReject::InvalidCode)
        );
        assert!(!gate.is_cleared("u1"));
    }

    #[tokio::test]
    async fn test_verify_without_request() {
        let gate = gate();
        assert_eq!(
            gate.verify_code("u1", "123456"),
            Err(EntryReject::InvalidCode)
        );
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let gate = EntryGate::new(
            Arc::new(UserStore::new()),
            Arc::new(MailNotifier::from_env()),
            0,
            3,
        );
        gate.request_code("u1").unwrap();
        let code = gate.issued_code("u1").unwrap();
        assert_eq!(gate.verify_code("u1", &code), Err(EntryReject::InvalidCode));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_request() {
        let users = Arc::new(UserStore::new());
        for _ in 0..3 {
            users.apply_missed_payment("u1", 0, "MISSED_PAYMENT_FEE");
        }
        let gate = EntryGate::new(users, Arc::new(MailNotifier::from_env()), 600, 3);

        assert_eq!(
            gate.request_code("u1"),
            Err(EntryReject::PermanentlyBanned)
        );
    }

    #[tokio::test]
    async fn test_reissue_replaces_old_code() {
        let gate = gate();
        gate.request_code("u1").unwrap();
        let first = gate.issued_code("u1").unwrap();
        gate.request_code("u1").unwrap();
        let second = gate.issued_code("u1").unwrap();

        if first != second {
            assert_eq!(
                gate.verify_code("u1", &first),
                Err(EntryReject::InvalidCode)
            );
        } else {
            gate.verify_code("u1", &second).unwrap();
        }
    }
}
