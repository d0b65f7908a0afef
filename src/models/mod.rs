// src/models/mod.rs

pub mod attempt;
pub mod ledger;
pub mod question;
pub mod quiz;
