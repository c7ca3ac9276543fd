//! Wire types for the incremental ingestion REST surface.
//!
//! Field names follow the JSON the catalog backend emits, which mixes
//! snake_case (`current_action`) and camelCase (`ingestionsDeleted`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Reads ───────────────────────────────────────────────────────

/// Health of all incremental providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalProviderHealthResponse {
    pub healthy: bool,
    /// Providers with more than one open ingestion record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_ingestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersListResponse {
    pub success: bool,
    pub providers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub current_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatusResponse {
    pub success: bool,
    pub status: ProviderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// One checkpoint recorded during an ingestion cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionMark {
    pub id: String,
    pub sequence: u64,
    pub ingestion_id: String,
    /// Opaque provider cursor; a string or arbitrary JSON.
    #[serde(default)]
    pub cursor: Value,
    pub created_at: String,
}

/// Marks for the current cycle.
///
/// `success` and the presence of `records` are independent: a successful
/// response may carry an empty or missing list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionMarksResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<IngestionMark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ── Commands ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPurgeResponse {
    pub provider: String,
    pub ingestions_deleted: u64,
    pub marks_deleted: u64,
    pub mark_entities_deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMarksResponse {
    pub success: bool,
    pub message: String,
    pub deletions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub ingestions_deleted: u64,
    pub ingestion_marks_deleted: u64,
    pub mark_entities_deleted: u64,
}

impl CleanupResponse {
    /// Fold one provider purge into the running totals.
    pub fn absorb(&mut self, purge: &ProviderPurgeResponse) {
        self.ingestions_deleted += purge.ingestions_deleted;
        self.ingestion_marks_deleted += purge.marks_deleted;
        self.mark_entities_deleted += purge.mark_entities_deleted;
    }
}

// ── Provider state ──────────────────────────────────────────────

/// Scheduler state of a provider as reported in `current_action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderState {
    #[serde(rename = "resting")]
    Resting,
    #[serde(rename = "interstitial")]
    Interstitial,
    #[serde(rename = "bursting")]
    Bursting,
    #[serde(rename = "backing off")]
    BackingOff,
    #[serde(rename = "error")]
    Error,
}

impl ProviderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resting => "resting",
            Self::Interstitial => "interstitial",
            Self::Bursting => "bursting",
            Self::BackingOff => "backing off",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse display category for a free-form `current_action` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Ok,
    Running,
    Warning,
    Error,
    Unknown,
}

impl StatusKind {
    /// Classify by case-insensitive substring, first match wins.
    pub fn classify(status: &str) -> Self {
        let s = status.to_lowercase();
        if s.contains("resting") || s.contains("complete") {
            Self::Ok
        } else if s.contains("interstitial") || s.contains("bursting") {
            Self::Running
        } else if s.contains("backing off") {
            Self::Warning
        } else if s.contains("error") {
            Self::Error
        } else {
            Self::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_status_strings() {
        assert_eq!(StatusKind::classify("resting"), StatusKind::Ok);
        assert_eq!(StatusKind::classify("Ingestion Complete"), StatusKind::Ok);
        assert_eq!(StatusKind::classify("INTERSTITIAL"), StatusKind::Running);
        assert_eq!(StatusKind::classify("bursting"), StatusKind::Running);
        assert_eq!(StatusKind::classify("backing off"), StatusKind::Warning);
        assert_eq!(StatusKind::classify("error"), StatusKind::Error);
        assert_eq!(StatusKind::classify("paused"), StatusKind::Unknown);
    }

    #[test]
    fn provider_state_wire_names() {
        assert_eq!(
            serde_json::to_value(ProviderState::BackingOff).unwrap(),
            json!("backing off")
        );
        let state: ProviderState = serde_json::from_value(json!("interstitial")).unwrap();
        assert_eq!(state, ProviderState::Interstitial);
        for state in [
            ProviderState::Resting,
            ProviderState::Interstitial,
            ProviderState::Bursting,
            ProviderState::BackingOff,
            ProviderState::Error,
        ] {
            assert_ne!(StatusKind::classify(state.as_str()), StatusKind::Unknown);
        }
    }

    #[test]
    fn purge_and_cleanup_use_camel_case() {
        let purge = ProviderPurgeResponse {
            provider: "github".into(),
            ingestions_deleted: 1,
            marks_deleted: 2,
            mark_entities_deleted: 3,
        };
        assert_eq!(
            serde_json::to_value(&purge).unwrap(),
            json!({
                "provider": "github",
                "ingestionsDeleted": 1,
                "marksDeleted": 2,
                "markEntitiesDeleted": 3
            })
        );

        let mut cleanup = CleanupResponse::default();
        cleanup.absorb(&purge);
        cleanup.absorb(&purge);
        assert_eq!(
            serde_json::to_value(&cleanup).unwrap(),
            json!({"ingestionsDeleted": 2, "ingestionMarksDeleted": 4, "markEntitiesDeleted": 6})
        );
    }

    #[test]
    fn optional_fields_may_be_absent() {
        let health: IncrementalProviderHealthResponse =
            serde_json::from_value(json!({"healthy": true})).unwrap();
        assert_eq!(health.duplicate_ingestions, None);

        let marks: IngestionMarksResponse =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(marks.success);
        assert!(marks.records.is_none());

        let status: ProviderStatusResponse = serde_json::from_value(json!({
            "success": true,
            "status": {"current_action": "resting"}
        }))
        .unwrap();
        assert_eq!(status.status.next_action_at, None);
        assert_eq!(status.last_error, None);
    }

    #[test]
    fn mark_cursor_accepts_any_json() {
        let mark: IngestionMark = serde_json::from_value(json!({
            "id": "m1",
            "sequence": 4,
            "ingestion_id": "i1",
            "cursor": {"page": 2},
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(mark.cursor, json!({"page": 2}));
    }
}
