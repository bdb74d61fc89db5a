//! ユーザーストア（残高・未払いカウンタ・ウォレット台帳）
//!
//! 残高コラボレーターに相当する。ペナルティ適用は減算・カウンタ増加・
//! 台帳追記を1つの書き込みロック区間で行い、途中状態を外に見せない。

use std::collections::HashMap;
use std::sync::RwLock;

use super::now_millis;

/// ユーザー口座
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub user_id: String,
    pub balance: u64,
    /// 落札したのに支払わなかった回数
    pub payment_failures: u32,
}

/// ウォレット台帳エントリ（減算の記録）
#[derive(Debug, Clone)]
pub struct WalletEntry {
    pub user_id: String,
    pub amount: u64,
    pub reason: String,
    pub at_ms: u64,
}

/// インメモリユーザーストア
pub struct UserStore {
    accounts: RwLock<HashMap<String, UserAccount>>,
    ledger: RwLock<Vec<WalletEntry>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            ledger: RwLock::new(Vec::new()),
        }
    }

    /// 残高を積む（口座が無ければ作る）
    pub fn credit(&self, user_id: &str, amount: u64) {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| UserAccount {
                user_id: user_id.to_string(),
                balance: 0,
                payment_failures: 0,
            });
        account.balance = account.balance.saturating_add(amount);
    }

    pub fn account(&self, user_id: &str) -> Option<UserAccount> {
        self.accounts.read().unwrap().get(user_id).cloned()
    }

    pub fn payment_failures(&self, user_id: &str) -> u32 {
        self.accounts
            .read()
            .unwrap()
            .get(user_id)
            .map(|a| a.payment_failures)
            .unwrap_or(0)
    }

    /// 未払いペナルティの適用。
    /// 希望額を上限残高まで減算し、残高不足でもカウンタは必ず増やす。
    /// 戻り値は (実際に減算した額, 適用後の未払い回数)。
    pub fn apply_missed_payment(&self, user_id: &str, fee_requested: u64, reason: &str) -> (u64, u32) {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(|| UserAccount {
                user_id: user_id.to_string(),
                balance: 0,
                payment_failures: 0,
            });
        let deducted = fee_requested.min(account.balance);
        account.balance -= deducted;
        account.payment_failures += 1;
        let failures = account.payment_failures;
        drop(accounts);

        self.ledger.write().unwrap().push(WalletEntry {
            user_id: user_id.to_string(),
            amount: deducted,
            reason: reason.to_string(),
            at_ms: now_millis(),
        });
        (deducted, failures)
    }

    pub fn ledger_for(&self, user_id: &str) -> Vec<WalletEntry> {
        self.ledger
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_account() {
        let store = UserStore::new();
        store.credit("u1", 500);
        store.credit("u1", 250);

        let account = store.account("u1").unwrap();
        assert_eq!(account.balance, 750);
        assert_eq!(account.payment_failures, 0);
    }

    #[test]
    fn test_missed_payment_caps_at_balance() {
        let store = UserStore::new();
        store.credit("u1", 100);

        let (deducted, failures) = store.apply_missed_payment("u1", 300, "MISSED_PAYMENT_FEE");
        assert_eq!(deducted, 100);
        assert_eq!(failures, 1);
        assert_eq!(store.account("u1").unwrap().balance, 0);

        // 残高ゼロでもカウンタは増える
        let (deducted, failures) = store.apply_missed_payment("u1", 300, "MISSED_PAYMENT_FEE");
        assert_eq!(deducted, 0);
        assert_eq!(failures, 2);

        let entries = store.ledger_for("u1");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount, 100);
    }
}
