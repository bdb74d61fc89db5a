//! ストア層
//!
//! オークション・入札台帳・ユーザー残高・カートホールド・カタログを
//! メモリ内で管理する。各ストアの所有範囲:
//! - AuctionStore: オークション行とそのライフサイクル
//! - BidLedger: 入札行（追記専用。精算は読むだけで書き換えない）
//! - UserStore: 残高・未払いカウンタ・ウォレット台帳
//! - CartStore: 在庫ユニット単位のカートホールド（精算エンジンのみが書く）
//! - CatalogStore: ユニットの基準価格・刻み幅の読み取りモデル

mod auctions;
mod bids;
mod carts;
mod catalog;
mod users;

pub use auctions::{Auction, AuctionStatus, AuctionStore};
pub use bids::{Bid, BidLedger};
pub use carts::{CartHold, CartStore};
pub use catalog::{CatalogStore, CatalogUnit};
pub use users::{UserAccount, UserStore, WalletEntry};

use std::time::{SystemTime, UNIX_EPOCH};

/// 現在時刻（unixミリ秒）
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
