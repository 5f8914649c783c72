use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tracing::{debug, info};

use crate::{
    database::{self, InsertOutcome},
    utils,
    web::{
        submission::{Submission, SubmissionKind},
        types::{NewSubscriber, SubscribeAck, ValidEmail},
        WebResult, LANDING_SUCCESS_PATH,
    },
    AppState,
};

// ###################################
// ->   ERROR
// ###################################
#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("failed to store the subscriber")]
    Store(#[from] database::Error),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        utils::error_chain_fmt(self, f)
    }
}

// ###################################
// ->   API
// ###################################
/// Validates a submission and stores the subscriber if the email isn't known yet.
///
/// Browser forms are redirected back to the landing page, JSON clients get a JSON acknowledgment.
/// Duplicates are answered exactly like new subscribers.
#[tracing::instrument(
    name = "Adding a new subscriber",
    skip(app_state, headers, submission),
    fields(kind = ?submission.kind)
)]
pub async fn subscribe(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    submission: Submission,
) -> WebResult<Response> {
    // Bots get the same answer as humans.
    if submission.is_bot() {
        info!("honeypot field filled in, dropping the submission");
        return Ok(success_response(submission.kind));
    }

    let email = match ValidEmail::parse(&submission.email) {
        Ok(email) => email,
        Err(er) => {
            debug!(error = %er, "rejected the submitted email");
            return Ok(invalid_email_response(submission.kind));
        }
    };

    let subscribe_config = &app_state.subscribe_config;
    let source = submission.source_or(&subscribe_config.default_source);
    let (ip_hash, user_agent) = if subscribe_config.capture_metadata {
        request_metadata(&headers, &app_state.client_ip_header)
    } else {
        (None, None)
    };

    let subscriber = NewSubscriber::new(email, source, ip_hash, user_agent);
    let outcome = app_state
        .store
        .insert_or_ignore(&subscriber)
        .await
        .map_err(SubscribeError::Store)?;

    match outcome {
        InsertOutcome::Inserted => info!(source = %subscriber.source, "new subscriber stored"),
        InsertOutcome::AlreadySubscribed => info!("email already subscribed, nothing stored"),
    }

    Ok(success_response(submission.kind))
}

// ###################################
// ->   HELPERS
// ###################################
fn success_response(kind: SubmissionKind) -> Response {
    if kind.is_json() {
        Json(SubscribeAck::ok()).into_response()
    } else {
        Redirect::to(LANDING_SUCCESS_PATH).into_response()
    }
}

fn invalid_email_response(kind: SubmissionKind) -> Response {
    if kind.is_json() {
        (StatusCode::BAD_REQUEST, Json(SubscribeAck::invalid_email())).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            "Please enter a valid email. Go back and try again.",
        )
            .into_response()
    }
}

/// Returns `(ip_hash, user_agent)`.
/// A missing user-agent is stored as an empty string, a missing client ip as no hash at all.
fn request_metadata(
    headers: &HeaderMap,
    client_ip_header: &HeaderName,
) -> (Option<String>, Option<String>) {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let ip_hash = headers
        .get(client_ip_header)
        .and_then(|ip| ip.to_str().ok())
        .filter(|ip| !ip.is_empty())
        .map(utils::sha256_hex);

    (ip_hash, Some(user_agent))
}
