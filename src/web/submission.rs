//! Extraction of a subscription attempt from the request body.
//! The body is decoded according to its `content-type`, a body that can't be decoded is treated as empty.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::{Map, Value};
use tracing::debug;

/// How the client submitted the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    UrlEncoded,
    Multipart,
    Json,
    Other,
}

impl SubmissionKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.to_ascii_lowercase();

        if content_type.contains("application/x-www-form-urlencoded") {
            Self::UrlEncoded
        } else if content_type.contains("multipart/form-data") {
            Self::Multipart
        } else if content_type.contains("application/json") {
            Self::Json
        } else {
            Self::Other
        }
    }

    /// Browser form posts, these get redirects and plain text back.
    pub fn is_form(&self) -> bool {
        matches!(self, Self::UrlEncoded | Self::Multipart)
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

/// The raw, unvalidated fields of a subscription attempt.
/// Missing fields are empty strings.
#[derive(Debug, Clone)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub email: String,
    pub source: String,
    /// The hidden `company` form field, only ever filled in by bots.
    pub honeypot: String,
}

impl Submission {
    pub const EMAIL_FIELD: &'static str = "email";
    pub const SOURCE_FIELD: &'static str = "source";
    pub const HONEYPOT_FIELD: &'static str = "company";

    fn empty(kind: SubmissionKind) -> Self {
        Self {
            kind,
            email: String::new(),
            source: String::new(),
            honeypot: String::new(),
        }
    }

    /// Builds a submission from form pairs, the first occurrence of a field wins.
    fn from_pairs(kind: SubmissionKind, pairs: Vec<(String, String)>) -> Self {
        let mut submission = Self::empty(kind);
        let mut seen = [false; 3];

        for (name, value) in pairs {
            let (slot, target) = match name.as_str() {
                Self::EMAIL_FIELD => (0, &mut submission.email),
                Self::SOURCE_FIELD => (1, &mut submission.source),
                Self::HONEYPOT_FIELD => (2, &mut submission.honeypot),
                _ => continue,
            };
            if !seen[slot] {
                seen[slot] = true;
                *target = value;
            }
        }

        submission
    }

    /// JSON bodies never carry the honeypot.
    fn from_json_object(body: &Map<String, Value>) -> Self {
        let mut submission = Self::empty(SubmissionKind::Json);
        submission.email = json_field(body, Self::EMAIL_FIELD);
        submission.source = json_field(body, Self::SOURCE_FIELD);

        submission
    }

    /// `true` if the honeypot field was filled in.
    pub fn is_bot(&self) -> bool {
        self.kind.is_form() && !self.honeypot.trim().is_empty()
    }

    /// The submitted source tag, or `default` if none was given.
    pub fn source_or(&self, default: &str) -> String {
        if self.source.is_empty() {
            default.to_string()
        } else {
            self.source.clone()
        }
    }
}

/// Reads a field of a loosely typed JSON object as a string.
/// Strings are taken verbatim, non-zero numbers and `true` as their JSON text.
/// `false`, `0`, null, arrays, objects and missing keys are all empty.
pub fn json_field(body: &Map<String, Value>, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => true.to_string(),
        _ => String::new(),
    }
}

/// Parses a JSON body into an object, anything else becomes an empty object.
pub fn parse_json_object(bytes: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            debug!("{:<20} - JSON body is not an object", "submission");
            Map::new()
        }
        Err(er) => {
            debug!("{:<20} - malformed JSON body: {er}", "submission");
            Map::new()
        }
    }
}

/// Decodes a url-encoded body, a malformed one has no fields.
pub fn urlencoded_pairs(bytes: &[u8]) -> Vec<(String, String)> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes).unwrap_or_else(|er| {
        debug!("{:<20} - malformed form body: {er}", "submission");
        Vec::new()
    })
}

async fn multipart_pairs(mut multipart: Multipart) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                match field.text().await {
                    Ok(value) => pairs.push((name, value)),
                    Err(er) => {
                        debug!("{:<20} - unreadable multipart field '{name}': {er}", "submission");
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(er) => {
                debug!("{:<20} - malformed multipart body: {er}", "submission");
                break;
            }
        }
    }

    pairs
}

/// Never rejects: a body that fails to decode yields an empty `Submission`,
/// which then fails email validation.
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let kind = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(SubmissionKind::from_content_type)
            .unwrap_or(SubmissionKind::Other);

        let submission = match kind {
            SubmissionKind::UrlEncoded => match Bytes::from_request(req, state).await {
                Ok(bytes) => Self::from_pairs(kind, urlencoded_pairs(&bytes)),
                Err(rejection) => {
                    debug!("{:<20} - body rejected: {rejection}", "submission");
                    Self::empty(kind)
                }
            },
            SubmissionKind::Multipart => match Multipart::from_request(req, state).await {
                Ok(multipart) => Self::from_pairs(kind, multipart_pairs(multipart).await),
                Err(rejection) => {
                    debug!("{:<20} - multipart rejected: {rejection}", "submission");
                    Self::empty(kind)
                }
            },
            SubmissionKind::Json => match Bytes::from_request(req, state).await {
                Ok(bytes) => Self::from_json_object(&parse_json_object(&bytes)),
                Err(rejection) => {
                    debug!("{:<20} - body rejected: {rejection}", "submission");
                    Self::empty(kind)
                }
            },
            SubmissionKind::Other => Self::empty(kind),
        };

        Ok(submission)
    }
}
