//! # Canonical Status Vocabulary
//!
//! The six lifecycle states a service request can hold, and the pure
//! normalization function that canonicalizes free-form state strings.
//!
//! One display alias exists: the external API spelling `in_process` is
//! accepted as input and rendered as output, but the persisted and
//! compared value is always `in_progress`. Normalization applies that
//! alias exactly once, after folding case and separator variants.

use serde::{Deserialize, Serialize};

/// Canonical lifecycle state of a service request.
///
/// Serialized with the canonical (persisted) spelling. The API layer
/// renders [`RequestState::api_str`] instead, which substitutes the
/// `in_process` display alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Opened by a customer, not yet triaged.
    Pending,
    /// Under administrator triage.
    InReview,
    /// A technician has been designated.
    Assigned,
    /// The technician is working the request.
    InProgress,
    /// Work finished. The only state a reopen can leave from.
    Completed,
    /// Abandoned. Carries an auto-comment when none was provided.
    Cancelled,
}

impl RequestState {
    /// The canonical string name of this state (persisted spelling).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// The external API spelling. Identical to [`Self::as_str`] for
    /// every state except `in_progress`, which renders as the
    /// `in_process` alias at the read boundary.
    pub fn api_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_process",
            other => other.as_str(),
        }
    }

    /// Parse a canonical token produced by [`normalize`].
    ///
    /// Returns `None` for anything outside the six canonical names —
    /// the authorizer turns that into an unsupported-target-state
    /// rejection so there is one unambiguous error path.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// All six states, in lifecycle order. Used by the metrics gauge.
    pub fn all() -> [RequestState; 6] {
        [
            Self::Pending,
            Self::InReview,
            Self::Assigned,
            Self::InProgress,
            Self::Completed,
            Self::Cancelled,
        ]
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonicalize a free-form state string into the internal vocabulary.
///
/// Lowercases, trims, collapses any run of whitespace, hyphen, or
/// underscore separators to a single underscore, then applies the one
/// known alias (`in_process` → `in_progress`). Absent or
/// effectively-empty input yields `None` — "no requested state",
/// distinct from an invalid one. Unknown but well-formed tokens pass
/// through unchanged for the authorizer to reject.
pub fn normalize(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let lowered = raw.to_lowercase();
    let mut token = String::with_capacity(lowered.len());
    for segment in lowered
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|s| !s.is_empty())
    {
        if !token.is_empty() {
            token.push('_');
        }
        token.push_str(segment);
    }
    if token.is_empty() {
        return None;
    }
    if token == "in_process" {
        token = "in_progress".to_string();
    }
    Some(token)
}
