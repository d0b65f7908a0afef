// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::quiz::{SelectAnswerRequest, StartSessionRequest},
    quiz::{LoadOutcome, QuizSession, SessionRegistry, SubmitOutcome},
    store::Stores,
    utils::jwt::Claims,
};

/// Opens a quiz session for a lesson.
///
/// * Loads the newest quiz for the lesson and starts its countdown.
/// * Returns 201 with the session view, or 200 with `state: "empty"` when the
///   lesson has no quiz.
pub async fn start_session(
    State(stores): State<Stores>,
    State(sessions): State<SessionRegistry>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    match QuizSession::load(req.lesson_id, user_id, stores, config.rules).await? {
        LoadOutcome::Ready(session) => {
            let view = session.view().await;
            sessions.insert(session).await;
            Ok((StatusCode::CREATED, Json(json!(view))))
        }
        LoadOutcome::Empty => Ok((
            StatusCode::OK,
            Json(json!({
                "state": "empty",
                "message": "This lesson doesn't have a quiz yet."
            })),
        )),
    }
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = sessions.get(session_id, claims.user_id()?).await?;
    Ok(Json(session.view().await))
}

/// Records the learner's choice for one question.
pub async fn select_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = sessions.get(session_id, claims.user_id()?).await?;
    session
        .select_answer(req.question_index as usize, req.option_index)
        .await?;
    Ok(Json(session.view().await))
}

pub async fn advance(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = sessions.get(session_id, claims.user_id()?).await?;
    session.advance().await?;
    Ok(Json(session.view().await))
}

pub async fn retreat(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = sessions.get(session_id, claims.user_id()?).await?;
    session.retreat().await?;
    Ok(Json(session.view().await))
}

/// Submits the attempt for scoring.
///
/// A submission that loses the race against another one (for instance the
/// timer) is not an error: `submitted` is false and the view shows whatever
/// the winning submission produced.
pub async fn submit(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = sessions.get(session_id, claims.user_id()?).await?;
    let outcome = session.submit().await?;
    let submitted = matches!(outcome, SubmitOutcome::Scored(_));

    Ok(Json(json!({
        "submitted": submitted,
        "session": session.view().await,
    })))
}

/// Buys another attempt after a failing score.
pub async fn retake(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = sessions.get(session_id, claims.user_id()?).await?;
    let balance = session.retake().await?;

    Ok(Json(json!({
        "balance": balance,
        "session": session.view().await,
    })))
}

/// Closes a scored session and reports whether it passed.
pub async fn acknowledge(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let session = sessions.get(session_id, user_id).await?;
    let passed = session.acknowledge().await?;
    sessions.remove(session_id, user_id).await?;

    Ok(Json(json!({ "passed": passed })))
}

/// Abandons a session. Its countdown is cancelled.
pub async fn close_session(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sessions.remove(session_id, claims.user_id()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists the learner's previous attempts at this session's quiz, newest first.
pub async fn list_attempts(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = sessions.get(session_id, claims.user_id()?).await?;
    let history = session.refresh_history().await.map_err(|e| {
        tracing::error!("Failed to fetch attempt history: {}", e);
        e
    })?;
    Ok(Json(history))
}
