//! Session domain types shared by the store, the aggregator and the
//! transport layer.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{JudgeError, Result};

/// Upper bound on the byte length of a caller-supplied session id.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Caller-supplied session identifier.
///
/// Used verbatim as part of store keys and as the published asset name, so
/// construction rejects empty ids, oversized ids and control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(JudgeError::InvalidSession("session id is empty".into()));
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(JudgeError::InvalidSession(format!(
                "session id exceeds {MAX_SESSION_ID_LEN} bytes"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(JudgeError::InvalidSession(
                "session id contains control characters".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name the session image is published under, `<id>.png`.
    ///
    /// `None` when the id cannot be a single file name because it contains
    /// a path separator or starts with `.`.
    pub fn asset_file_name(&self) -> Option<String> {
        let usable = !self.0.starts_with('.') && !self.0.contains(['/', '\\']);
        usable.then(|| format!("{}.png", self.0))
    }
}

impl TryFrom<String> for SessionId {
    type Error = JudgeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

impl FromStr for SessionId {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-character theme the pose is judged against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Theme(String);

impl Theme {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(_), None) => Ok(Self(raw)),
            (None, _) => Err(JudgeError::InvalidTheme("theme is empty".into())),
            _ => Err(JudgeError::InvalidTheme(format!(
                "theme must be a single character, got {:?}",
                raw
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Theme {
    type Error = JudgeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Theme> for String {
    fn from(value: Theme) -> Self {
        value.0
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable name of a configured evaluator backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluatorId(String);

impl EvaluatorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvaluatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EvaluatorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One evaluator's judgment. `score` is 0-100 by convention only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub reason: String,
    pub score: i64,
}

/// Aggregated judgments for one session, keyed by evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionResult(BTreeMap<EvaluatorId, Score>);

impl SessionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, evaluator: EvaluatorId, score: Score) -> Option<Score> {
        self.0.insert(evaluator, score)
    }

    pub fn get(&self, evaluator: &EvaluatorId) -> Option<&Score> {
        self.0.get(evaluator)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, evaluator: &EvaluatorId) -> bool {
        self.0.contains_key(evaluator)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EvaluatorId, &Score)> {
        self.0.iter()
    }
}

impl FromIterator<(EvaluatorId, Score)> for SessionResult {
    fn from_iter<I: IntoIterator<Item = (EvaluatorId, Score)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lifecycle of a session record. Only ever moves forward:
/// `Unknown -> Pending -> Ready`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionStatus {
    #[default]
    Unknown,
    Pending,
    Ready,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Ready => "ready",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            _ => None,
        }
    }

    /// True if moving from `self` to `next` does not regress the lifecycle.
    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        next != Self::Unknown && next >= self
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a submission or poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The session was admitted just now and its fan-out was scheduled.
    Initializing,
    /// A fan-out for the session is queued or running.
    Waiting,
    /// The session is ready; the result may be empty or partial.
    Done(SessionResult),
    /// No session has been submitted yet.
    NoSession,
}

/// Result of resolving the latest-session pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestResult {
    pub session_id: Option<SessionId>,
    pub outcome: SubmissionOutcome,
}

impl LatestResult {
    pub fn none() -> Self {
        Self {
            session_id: None,
            outcome: SubmissionOutcome::NoSession,
        }
    }
}

/// Wire body of an evaluator invocation. Borrowed when sent, owned when
/// received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationRequest<'a> {
    pub model: Cow<'a, str>,
    pub theme: Cow<'a, str>,
    /// Base64 encoded image bytes.
    pub image: Cow<'a, str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_rejects_untrusted_shapes() {
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("a\nb").is_err());
        assert!(SessionId::parse("x".repeat(MAX_SESSION_ID_LEN + 1)).is_err());
        assert!(SessionId::parse("x".repeat(MAX_SESSION_ID_LEN)).is_ok());
    }

    #[test]
    fn asset_file_names() {
        let name = |raw: &str| SessionId::parse(raw).unwrap().asset_file_name();
        assert_eq!(name("abc-123_x.y").as_deref(), Some("abc-123_x.y.png"));
        assert_eq!(name("booth 2?x").as_deref(), Some("booth 2?x.png"));
        assert_eq!(name("../etc/passwd"), None);
        assert_eq!(name("a\\b"), None);
        assert_eq!(name(".hidden"), None);
    }

    #[test]
    fn theme_must_be_one_character() {
        assert!(Theme::parse("C").is_ok());
        assert!(Theme::parse("あ").is_ok());
        assert!(Theme::parse("").is_err());
        assert!(Theme::parse("AB").is_err());
    }

    #[test]
    fn status_never_regresses() {
        use SessionStatus::*;
        assert!(Unknown.can_advance_to(Pending));
        assert!(Pending.can_advance_to(Ready));
        assert!(Ready.can_advance_to(Ready));
        assert!(!Ready.can_advance_to(Pending));
        assert!(!Pending.can_advance_to(Unknown));
    }

    #[test]
    fn session_result_serializes_as_plain_map() {
        let result: SessionResult = [(
            EvaluatorId::new("amazon"),
            Score {
                reason: "arms form the letter".into(),
                score: 82,
            },
        )]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"amazon": {"reason": "arms form the letter", "score": 82}})
        );
    }

    #[test]
    fn session_result_survives_a_json_round_trip() {
        let result: SessionResult = [
            ("amazon", "arms form the letter", 82),
            ("anthropic", "left arm is \"bent\"\nslightly", 0),
            ("meta", "", -5),
        ]
        .into_iter()
        .map(|(id, reason, score)| {
            (
                EvaluatorId::new(id),
                Score {
                    reason: reason.into(),
                    score,
                },
            )
        })
        .collect();

        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: SessionResult = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.len(), 3);
        for (evaluator, score) in result.iter() {
            let back = decoded.get(evaluator).unwrap();
            assert_eq!(back.reason, score.reason, "reason of {evaluator}");
            assert_eq!(back.score, score.score, "score of {evaluator}");
        }
        assert_eq!(decoded, result);
    }

    #[test]
    fn invocation_request_wire_shape() {
        let image = "AQID".to_string();
        let sent = InvocationRequest {
            model: Cow::Borrowed("amazon.nova-pro-v1:0"),
            theme: Cow::Borrowed("C"),
            image: Cow::Borrowed(&image),
        };

        let json = serde_json::to_value(&sent).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "amazon.nova-pro-v1:0", "theme": "C", "image": "AQID"})
        );

        let received: InvocationRequest<'static> = serde_json::from_value(json).unwrap();
        assert_eq!(received, sent);
    }
}
