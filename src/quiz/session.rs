// src/quiz/session.rs

//! Quiz Session Controller.
//!
//! A session is created by [`QuizSession::load`] and lives until
//! [`QuizSession::dispose`] (or [`QuizSession::acknowledge`]) is called or
//! the last handle is dropped. It owns the countdown task; the task only
//! holds a weak reference, so it can never keep a torn-down session alive.
//!
//! ```text
//! load ──> Active ──submit / timer──> Submitting ──> Results ──acknowledge──> Disposed
//!   │        ^                                          │
//!   │        └────────────── retake (paid) ─────────────┘
//!   └──> Empty (no quiz for the lesson)
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant},
};
use uuid::Uuid;

use crate::{
    config::QuizRules,
    error::AppError,
    models::{
        attempt::{NewAttempt, QuestionFeedback, QuizAttemptRecord},
        question::PublicQuestion,
        quiz::QuizDefinition,
    },
    quiz::{normalize::normalize_definition, scoring::grade},
    store::Stores,
};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizPhase {
    Active,
    Submitting,
    Results,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    TimerExpired,
}

/// In-memory progress of the current attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptState {
    pub current_question_index: usize,
    /// Question index -> chosen option index.
    pub answers: HashMap<usize, i64>,
    pub remaining_seconds: u32,
    /// Set before any scoring work starts; the only guard against double submission.
    pub submitted: bool,
}

impl AttemptState {
    fn fresh(time_limit_seconds: u32) -> Self {
        Self {
            current_question_index: 0,
            answers: HashMap::new(),
            remaining_seconds: time_limit_seconds,
            submitted: false,
        }
    }
}

/// What the learner sees after a submission.
#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub score_percent: i32,
    pub passed: bool,
    pub correct_count: usize,
    pub total_questions: usize,
    pub passing_threshold: i32,
    pub feedback: Vec<QuestionFeedback>,
    pub trigger: SubmitTrigger,
    pub message: String,
    pub attempt_saved: bool,
    /// Balance after the pass reward, when it was applied.
    pub balance: Option<f64>,
    /// Non-fatal problems the learner should be told about.
    pub notices: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Scored(QuizResult),
    /// Another submission already won the guard; nothing was done.
    AlreadySubmitted,
}

pub enum LoadOutcome {
    Ready(Arc<QuizSession>),
    /// No quiz exists for the lesson. Not an error.
    Empty,
}

/// Read-only snapshot for clients. Never contains answer keys.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub quiz_id: Uuid,
    pub lesson_id: Uuid,
    pub phase: QuizPhase,
    pub current_question_index: usize,
    pub total_questions: usize,
    pub question: Option<PublicQuestion>,
    pub selected_option: Option<i64>,
    pub answered_count: usize,
    pub remaining_seconds: u32,
    pub time_left: String,
    pub progress_percent: f64,
    pub passing_threshold: i32,
    pub can_go_back: bool,
    pub can_advance: bool,
    pub can_submit: bool,
    pub result: Option<QuizResult>,
    pub attempts_count: usize,
}

enum Tick {
    Running,
    Expired,
    Stopped,
}

struct SessionInner {
    phase: QuizPhase,
    attempt: AttemptState,
    result: Option<QuizResult>,
    history: Vec<QuizAttemptRecord>,
    retake_in_flight: bool,
}

pub struct QuizSession {
    id: Uuid,
    user_id: Uuid,
    definition: QuizDefinition,
    rules: QuizRules,
    stores: Stores,
    inner: Mutex<SessionInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl QuizSession {
    /// Fetches the lesson's quiz and starts an attempt with a running timer.
    ///
    /// Store failures are returned to the caller and leave nothing behind.
    /// A missing quiz is [`LoadOutcome::Empty`].
    pub async fn load(
        lesson_id: Uuid,
        user_id: Uuid,
        stores: Stores,
        rules: QuizRules,
    ) -> Result<LoadOutcome, AppError> {
        let row = stores
            .content
            .fetch_quiz_definition(lesson_id)
            .await
            .map_err(|e| {
                tracing::error!("Error loading quiz for lesson {}: {}", lesson_id, e);
                AppError::InternalServerError(format!("Unable to load quiz data: {}", e))
            })?;

        let Some(definition) = row.and_then(|row| normalize_definition(row, &rules)) else {
            tracing::info!("No quiz available for lesson {}", lesson_id);
            return Ok(LoadOutcome::Empty);
        };

        let history = match stores
            .content
            .fetch_attempt_history(definition.id, user_id)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("Failed to fetch attempt history for quiz {}: {}", definition.id, e);
                Vec::new()
            }
        };

        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            user_id,
            inner: Mutex::new(SessionInner {
                phase: QuizPhase::Active,
                attempt: AttemptState::fresh(definition.time_limit_seconds()),
                result: None,
                history,
                retake_in_flight: false,
            }),
            definition,
            rules,
            stores,
            timer: Mutex::new(None),
        });

        tracing::info!(
            session = %session.id,
            quiz = %session.definition.id,
            questions = session.definition.questions.len(),
            "Quiz session started"
        );

        session.start_timer().await;
        Ok(LoadOutcome::Ready(session))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn definition(&self) -> &QuizDefinition {
        &self.definition
    }

    pub async fn phase(&self) -> QuizPhase {
        self.inner.lock().await.phase
    }

    pub async fn attempt(&self) -> AttemptState {
        self.inner.lock().await.attempt.clone()
    }

    pub async fn result(&self) -> Option<QuizResult> {
        self.inner.lock().await.result.clone()
    }

    pub async fn history(&self) -> Vec<QuizAttemptRecord> {
        self.inner.lock().await.history.clone()
    }

    /// Records (or overwrites) the chosen option for a question.
    pub async fn select_answer(&self, question_index: usize, option_index: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        ensure_answering(&inner)?;
        if question_index >= self.definition.questions.len() {
            return Err(AppError::BadRequest(format!(
                "Question {} does not exist",
                question_index
            )));
        }
        inner.attempt.answers.insert(question_index, option_index);
        Ok(())
    }

    /// Moves to the next question. On the final question the caller must submit instead.
    pub async fn advance(&self) -> Result<usize, AppError> {
        let mut inner = self.inner.lock().await;
        ensure_answering(&inner)?;
        let next = inner.attempt.current_question_index + 1;
        if next >= self.definition.questions.len() {
            return Err(AppError::BadRequest(
                "Already on the final question; submit the quiz instead".to_string(),
            ));
        }
        inner.attempt.current_question_index = next;
        Ok(next)
    }

    /// Moves to the previous question. A no-op on the first question.
    pub async fn retreat(&self) -> Result<usize, AppError> {
        let mut inner = self.inner.lock().await;
        ensure_answering(&inner)?;
        let previous = inner.attempt.current_question_index.saturating_sub(1);
        inner.attempt.current_question_index = previous;
        Ok(previous)
    }

    /// Learner-initiated submission.
    ///
    /// Allowed on the final question once it has an answer. If a submission
    /// (manual or timer) already started, this returns
    /// [`SubmitOutcome::AlreadySubmitted`] without doing anything.
    ///
    /// Once the guard is taken, scoring and persistence run on their own task,
    /// so a caller that goes away cannot leave the session in `Submitting`.
    pub async fn submit(self: &Arc<Self>) -> Result<SubmitOutcome, AppError> {
        let Some(answers) = self.begin_submission(SubmitTrigger::Manual).await? else {
            return Ok(SubmitOutcome::AlreadySubmitted);
        };

        let session = Arc::clone(self);
        let result = tokio::spawn(async move {
            if let Some(timer) = session.timer.lock().await.take() {
                timer.abort();
            }
            session
                .complete_submission(answers, SubmitTrigger::Manual)
                .await
        })
        .await
        .map_err(|e| AppError::InternalServerError(format!("Submission task failed: {}", e)))?;

        Ok(SubmitOutcome::Scored(result))
    }

    /// Pays for a new attempt after a failing result.
    ///
    /// The debit is committed before the attempt is reset; if the ledger
    /// cannot be read or the balance is short, the session stays in results.
    /// Returns the balance after the debit.
    pub async fn retake(self: &Arc<Self>) -> Result<f64, AppError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase != QuizPhase::Results {
                return Err(AppError::Conflict(
                    "A retake is only available after the quiz has been scored".to_string(),
                ));
            }
            if inner.result.as_ref().is_some_and(|r| r.passed) {
                return Err(AppError::Conflict(
                    "This quiz was passed; there is nothing to retake".to_string(),
                ));
            }
            if inner.retake_in_flight {
                return Err(AppError::Conflict(
                    "A retake is already being purchased".to_string(),
                ));
            }
            inner.retake_in_flight = true;
        }

        // The purchase runs to completion even if the caller goes away.
        let session = Arc::clone(self);
        match tokio::spawn(session.purchase_retake()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.inner.lock().await.retake_in_flight = false;
                Err(AppError::InternalServerError(format!(
                    "Retake task failed: {}",
                    e
                )))
            }
        }
    }

    /// Debits the retake cost and, once it is committed, resets the attempt.
    async fn purchase_retake(self: Arc<Self>) -> Result<f64, AppError> {
        let cost = self.rules.retake_cost;
        let debit = self
            .stores
            .ledger
            .debit_if_sufficient(self.user_id, cost)
            .await;

        let mut inner = self.inner.lock().await;
        inner.retake_in_flight = false;

        let balance = match debit {
            Ok(Some(balance)) => balance,
            Ok(None) => {
                tracing::info!(session = %self.id, "Retake denied: insufficient credits");
                return Err(AppError::InsufficientBalance(format!(
                    "You need {} credits to retake the quiz",
                    cost
                )));
            }
            Err(e) => {
                tracing::error!(session = %self.id, "Balance check failed during retake: {}", e);
                return Err(AppError::InsufficientBalance(
                    "Unable to verify your credit balance".to_string(),
                ));
            }
        };

        if inner.phase != QuizPhase::Results {
            // Disposed while the debit was in flight.
            drop(inner);
            tracing::warn!(session = %self.id, "Session closed during retake, refunding {}", cost);
            if let Err(e) = self.stores.ledger.adjust_balance(self.user_id, cost).await {
                tracing::error!(session = %self.id, "Retake refund failed: {}", e);
            }
            return Err(AppError::Conflict("The quiz session has been closed".to_string()));
        }

        inner.attempt = AttemptState::fresh(self.definition.time_limit_seconds());
        inner.result = None;
        inner.phase = QuizPhase::Active;
        drop(inner);

        tracing::info!(session = %self.id, balance, "Retake purchased");
        self.start_timer().await;
        Ok(balance)
    }

    /// Ends the session after results were shown. Returns whether the attempt passed.
    pub async fn acknowledge(&self) -> Result<bool, AppError> {
        let passed = {
            let inner = self.inner.lock().await;
            match (&inner.phase, &inner.result) {
                (QuizPhase::Results, Some(result)) => result.passed,
                _ => {
                    return Err(AppError::Conflict(
                        "The quiz has not been scored yet".to_string(),
                    ));
                }
            }
        };
        self.dispose().await;
        Ok(passed)
    }

    /// Tears the session down and cancels its countdown.
    pub async fn dispose(&self) {
        self.inner.lock().await.phase = QuizPhase::Disposed;
        if let Some(timer) = self.timer.lock().await.take() {
            timer.abort();
        }
        tracing::debug!(session = %self.id, "Quiz session disposed");
    }

    /// Re-reads the learner's attempt history for this quiz.
    pub async fn refresh_history(&self) -> Result<Vec<QuizAttemptRecord>, AppError> {
        let history = self
            .stores
            .content
            .fetch_attempt_history(self.definition.id, self.user_id)
            .await?;
        self.inner.lock().await.history = history.clone();
        Ok(history)
    }

    pub async fn view(&self) -> SessionView {
        let inner = self.inner.lock().await;
        let total = self.definition.questions.len();
        let index = inner.attempt.current_question_index;
        let answering = inner.phase == QuizPhase::Active && !inner.attempt.submitted;
        let selected_option = inner.attempt.answers.get(&index).copied();
        let is_last = index + 1 >= total;

        SessionView {
            session_id: self.id,
            quiz_id: self.definition.id,
            lesson_id: self.definition.lesson_id,
            phase: inner.phase,
            current_question_index: index,
            total_questions: total,
            question: self
                .definition
                .questions
                .get(index)
                .map(|q| q.to_public(index)),
            selected_option,
            answered_count: inner.attempt.answers.len(),
            remaining_seconds: inner.attempt.remaining_seconds,
            time_left: format_clock(inner.attempt.remaining_seconds),
            progress_percent: (index + 1) as f64 / total.max(1) as f64 * 100.0,
            passing_threshold: self.definition.passing_threshold,
            can_go_back: answering && index > 0,
            can_advance: answering && !is_last,
            can_submit: answering && is_last && selected_option.is_some(),
            result: inner.result.clone(),
            attempts_count: inner.history.len(),
        }
    }

    /// Checks and sets the submission guard in one critical section.
    /// `Ok(None)` means another submission got there first.
    async fn begin_submission(
        &self,
        trigger: SubmitTrigger,
    ) -> Result<Option<HashMap<usize, i64>>, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.attempt.submitted {
            return Ok(None);
        }
        if inner.phase != QuizPhase::Active {
            return match trigger {
                SubmitTrigger::TimerExpired => Ok(None),
                SubmitTrigger::Manual => Err(AppError::Conflict(
                    "The quiz is not accepting submissions".to_string(),
                )),
            };
        }

        if trigger == SubmitTrigger::Manual {
            let last = self.definition.questions.len().saturating_sub(1);
            if inner.attempt.current_question_index != last {
                return Err(AppError::BadRequest(
                    "The quiz can only be submitted from the final question".to_string(),
                ));
            }
            if !inner.attempt.answers.contains_key(&last) {
                return Err(AppError::BadRequest(
                    "Answer the final question before submitting".to_string(),
                ));
            }
        }

        inner.attempt.submitted = true;
        inner.phase = QuizPhase::Submitting;
        Ok(Some(inner.attempt.answers.clone()))
    }

    /// Scores, persists and rewards. Store failures become notices; the
    /// locally computed result always stands.
    async fn complete_submission(
        &self,
        answers: HashMap<usize, i64>,
        trigger: SubmitTrigger,
    ) -> QuizResult {
        let card = grade(
            &self.definition.questions,
            &answers,
            self.definition.passing_threshold,
            &self.rules.fallback_tip,
        );
        let mut notices = Vec::new();

        let attempt = NewAttempt {
            quiz_id: self.definition.id,
            user_id: self.user_id,
            score_percent: card.score_percent,
            passed: card.passed,
            feedback: card.feedback.clone(),
            attempted_at: chrono::Utc::now(),
        };
        let attempt_saved = match self.stores.content.record_attempt(attempt).await {
            Ok(record) => {
                tracing::debug!(session = %self.id, attempt = %record.id, "Attempt recorded");
                true
            }
            Err(e) => {
                tracing::error!(session = %self.id, "Error saving attempt: {}", e);
                notices.push("Your attempt could not be saved.".to_string());
                false
            }
        };

        // Only after the attempt write has been tried.
        let mut balance = None;
        if card.passed {
            match self
                .stores
                .ledger
                .adjust_balance(self.user_id, self.rules.pass_reward)
                .await
            {
                Ok(updated) => balance = Some(updated),
                Err(e) => {
                    tracing::error!(session = %self.id, "Error crediting pass reward: {}", e);
                    notices.push("Your reward could not be credited.".to_string());
                }
            }
        }

        let history = match self
            .stores
            .content
            .fetch_attempt_history(self.definition.id, self.user_id)
            .await
        {
            Ok(history) => Some(history),
            Err(e) => {
                tracing::warn!(session = %self.id, "Failed to refresh attempt history: {}", e);
                None
            }
        };

        let message = if card.passed {
            format!(
                "You scored {}%! Earned {} credits",
                card.score_percent, self.rules.pass_reward
            )
        } else {
            format!(
                "You scored {}%. Need {}% to pass.",
                card.score_percent, self.definition.passing_threshold
            )
        };

        let result = QuizResult {
            score_percent: card.score_percent,
            passed: card.passed,
            correct_count: card.correct_count,
            total_questions: card.total_questions,
            passing_threshold: self.definition.passing_threshold,
            feedback: card.feedback,
            trigger,
            message,
            attempt_saved,
            balance,
            notices,
        };

        tracing::info!(
            session = %self.id,
            score = result.score_percent,
            passed = result.passed,
            ?trigger,
            "Quiz submitted"
        );

        let mut inner = self.inner.lock().await;
        if let Some(history) = history {
            inner.history = history;
        }
        inner.result = Some(result.clone());
        if inner.phase == QuizPhase::Submitting {
            inner.phase = QuizPhase::Results;
        }
        result
    }

    async fn start_timer(self: &Arc<Self>) {
        let session = Arc::downgrade(self);
        let handle = tokio::spawn(run_countdown(session));
        if let Some(previous) = self.timer.lock().await.replace(handle) {
            previous.abort();
        }
    }

    async fn tick(&self) -> Tick {
        let mut inner = self.inner.lock().await;
        if inner.phase != QuizPhase::Active || inner.attempt.submitted {
            return Tick::Stopped;
        }
        inner.attempt.remaining_seconds = inner.attempt.remaining_seconds.saturating_sub(1);
        if inner.attempt.remaining_seconds == 0 {
            Tick::Expired
        } else {
            Tick::Running
        }
    }

    async fn expire(&self) {
        match self.begin_submission(SubmitTrigger::TimerExpired).await {
            Ok(Some(answers)) => {
                tracing::info!(session = %self.id, "Time is up, submitting");
                self.complete_submission(answers, SubmitTrigger::TimerExpired)
                    .await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(session = %self.id, "Timed submission skipped: {}", e),
        }
    }
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// One-second countdown. Exits as soon as the session leaves `Active`, is
/// dropped, or the time runs out (in which case it submits).
async fn run_countdown(session: Weak<QuizSession>) {
    let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            break;
        };
        match session.tick().await {
            Tick::Running => {}
            Tick::Expired => {
                session.expire().await;
                break;
            }
            Tick::Stopped => break,
        }
    }
}

fn ensure_answering(inner: &SessionInner) -> Result<(), AppError> {
    if inner.phase != QuizPhase::Active || inner.attempt.submitted {
        return Err(AppError::Conflict(
            "The quiz is not accepting answers".to_string(),
        ));
    }
    Ok(())
}

fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
