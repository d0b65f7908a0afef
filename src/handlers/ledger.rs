// src/handlers/ledger.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};

use crate::{error::AppError, models::ledger::BalanceResponse, store::Stores, utils::jwt::Claims};

/// Current credit balance of the caller.
pub async fn get_balance(
    State(stores): State<Stores>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let balance = stores.ledger.get_balance(claims.user_id()?).await?;
    Ok(Json(BalanceResponse { balance }))
}
