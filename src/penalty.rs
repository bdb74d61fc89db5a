//! 未払いペナルティエンジン
//!
//! 支払い期限切れの落札に対して手数料を徴収し、未払い回数を進める。
//! 回数が上限に達したユーザーは恒久BAN扱いとなり、以降の入場コード
//! 発行が拒否される。

use std::sync::Arc;

use tracing::info;

use crate::notifier::MailNotifier;
use crate::store::UserStore;

/// ペナルティ適用結果
#[derive(Debug, Clone)]
pub struct PenaltyCharge {
    /// 実際に残高から引けた額（残高不足なら請求額未満）
    pub deducted: u64,
    pub fee_requested: u64,
    pub payment_failures: u32,
    pub banned: bool,
}

/// 未払いペナルティエンジン
pub struct PaymentPenaltyEngine {
    users: Arc<UserStore>,
    mailer: Arc<MailNotifier>,
    penalty_rate_pct: u64,
    strike_limit: u32,
}

impl PaymentPenaltyEngine {
    pub fn new(
        users: Arc<UserStore>,
        mailer: Arc<MailNotifier>,
        penalty_rate_pct: u64,
        strike_limit: u32,
    ) -> Self {
        Self {
            users,
            mailer,
            penalty_rate_pct,
            strike_limit,
        }
    }

    /// 落札額に対する手数料を計算する
    pub fn fee_for(&self, amount_owed: u64) -> u64 {
        amount_owed.saturating_mul(self.penalty_rate_pct) / 100
    }

    /// ユーザーが恒久BANか
    pub fn is_banned(&self, user_id: &str) -> bool {
        self.users.payment_failures(user_id) >= self.strike_limit
    }

    /// 未払い手数料を徴収し、未払い回数を進める。
    /// 残高不足でも回数は必ず進む（徴収できた分だけ引く）。
    pub fn charge_missed_payment_fee(&self, user_id: &str, amount_owed: u64) -> PenaltyCharge {
        let fee = self.fee_for(amount_owed);
        let (deducted, failures) =
            self.users
                .apply_missed_payment(user_id, fee, "MISSED_PAYMENT_FEE");
        let banned = failures >= self.strike_limit;

        info!(
            user_id = %user_id,
            fee = fee,
            deducted = deducted,
            failures = failures,
            banned = banned,
            "missed payment fee charged"
        );

        self.mailer.send(
            user_id,
            "missed_payment_fee",
            serde_json::json!({
                "fee": fee,
                "deducted": deducted,
                "paymentFailures": failures,
                "banned": banned,
            }),
        );

        PenaltyCharge {
            deducted,
            fee_requested: fee,
            payment_failures: failures,
            banned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PaymentPenaltyEngine {
        PaymentPenaltyEngine::new(
            Arc::new(UserStore::new()),
            Arc::new(MailNotifier::from_env()),
            10,
            3,
        )
    }

    #[tokio::test]
    async fn test_fee_is_rate_of_amount_owed() {
        let engine = engine();
        engine.users.credit("u1", 1_000_000);

        // 1,200,000の10% = 120,000
        let charge = engine.charge_missed_payment_fee("u1", 1_200_000);
        assert_eq!(charge.fee_requested, 120_000);
        assert_eq!(charge.deducted, 120_000);
        assert_eq!(charge.payment_failures, 1);
        assert!(!charge.banned);
        assert_eq!(engine.users.account("u1").unwrap().balance, 880_000);
    }

    #[tokio::test]
    async fn test_insufficient_balance_still_counts_strike() {
        let engine = engine();
        engine.users.credit("u1", 50_000);

        let charge = engine.charge_missed_payment_fee("u1", 1_200_000);
        assert_eq!(charge.deducted, 50_000);
        assert_eq!(charge.payment_failures, 1);
        assert_eq!(engine.users.account("u1").unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_third_strike_bans_user() {
        let engine = engine();
        engine.users.credit("u1", 1_000_000);

        assert!(!engine.charge_missed_payment_fee("u1", 100_000).banned);
        assert!(!engine.charge_missed_payment_fee("u1", 100_000).banned);
        let third = engine.charge_missed_payment_fee("u1", 100_000);
        assert!(third.banned);
        assert_eq!(third.payment_failures, 3);
        assert!(engine.is_banned("u1"));
    }
}
