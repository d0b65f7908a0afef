// src/models/ledger.rs

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: f64,
}
