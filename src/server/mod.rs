//! サーバー入口（HTTP）

pub mod http;
