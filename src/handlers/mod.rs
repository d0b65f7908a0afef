// src/handlers/mod.rs

pub mod ledger;
pub mod quiz;
