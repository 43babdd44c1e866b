use chrono::Utc;
use log::info;
use serde::{ Deserialize, Serialize };
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 1000;
const MAX_CONTENT_CHARS: usize = 500;
const PREVIEW_CHARS: usize = 100;
const RECENT_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("messageId is required")]
    MissingMessageId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSubmission {
    pub message_id: Option<String>,
    /// `null` means the visitor withdrew an earlier rating.
    pub feedback: Option<FeedbackKind>,
    pub message_content: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FeedbackEntry {
    pub id: String,
    pub message_id: String,
    pub feedback: Option<FeedbackKind>,
    pub message_content: String,
    pub timestamp: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStatistics {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub positive_rate: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFeedback {
    pub id: String,
    pub feedback: Option<FeedbackKind>,
    pub timestamp: String,
    pub content_preview: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackSummary {
    pub statistics: FeedbackStatistics,
    pub recent: Vec<RecentFeedback>,
}

/// Bounded ring of visitor ratings; the oldest entry is evicted first.
pub struct FeedbackStore {
    entries: Mutex<VecDeque<FeedbackEntry>>,
    capacity: usize,
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

pub(crate) fn event_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), &suffix[..7])
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

impl FeedbackStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(
        &self,
        submission: FeedbackSubmission,
        user_agent: Option<String>
    ) -> Result<String, FeedbackError> {
        let message_id = submission.message_id
            .filter(|id| !id.is_empty())
            .ok_or(FeedbackError::MissingMessageId)?;

        let content = submission.message_content.unwrap_or_default();
        let entry = FeedbackEntry {
            id: event_id("fb"),
            message_id,
            feedback: submission.feedback,
            message_content: truncate_chars(&content, MAX_CONTENT_CHARS).to_string(),
            timestamp: submission.timestamp.unwrap_or_else(|| Utc::now().to_rfc3339()),
            user_agent,
        };

        let label = match entry.feedback {
            Some(FeedbackKind::Positive) => "positive",
            Some(FeedbackKind::Negative) => "negative",
            None => "removed",
        };
        info!("Feedback {} for message {}", label, entry.message_id);

        let id = entry.id.clone();
        let mut entries = self.entries.lock().await;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn summary(&self) -> FeedbackSummary {
        let entries = self.entries.lock().await;
        let total = entries.len();
        let positive = entries
            .iter()
            .filter(|e| e.feedback == Some(FeedbackKind::Positive))
            .count();
        let negative = entries
            .iter()
            .filter(|e| e.feedback == Some(FeedbackKind::Negative))
            .count();
        let positive_rate = if total > 0 {
            format!("{:.1}%", ((positive as f64) / (total as f64)) * 100.0)
        } else {
            "N/A".to_string()
        };

        let recent = entries
            .iter()
            .rev()
            .take(RECENT_LIMIT)
            .map(|e| {
                let mut preview = truncate_chars(&e.message_content, PREVIEW_CHARS).to_string();
                if e.message_content.chars().count() > PREVIEW_CHARS {
                    preview.push_str("...");
                }
                RecentFeedback {
                    id: e.id.clone(),
                    feedback: e.feedback,
                    timestamp: e.timestamp.clone(),
                    content_preview: preview,
                }
            })
            .collect();

        FeedbackSummary {
            statistics: FeedbackStatistics { total, positive, negative, positive_rate },
            recent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, kind: Option<FeedbackKind>, content: &str) -> FeedbackSubmission {
        FeedbackSubmission {
            message_id: Some(id.to_string()),
            feedback: kind,
            message_content: Some(content.to_string()),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn message_id_is_required() {
        let store = FeedbackStore::default();
        let err = store.record(FeedbackSubmission::default(), None).await.unwrap_err();
        assert_eq!(err.to_string(), "messageId is required");
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn statistics_count_ratings() {
        let store = FeedbackStore::default();
        store.record(submission("m1", Some(FeedbackKind::Positive), "a"), None).await.unwrap();
        store.record(submission("m2", Some(FeedbackKind::Positive), "b"), None).await.unwrap();
        store.record(submission("m3", Some(FeedbackKind::Negative), "c"), None).await.unwrap();
        let id = store.record(submission("m4", None, "d"), Some("ua".into())).await.unwrap();
        assert!(id.starts_with("fb_"));

        let summary = store.summary().await;
        assert_eq!(summary.statistics.total, 4);
        assert_eq!(summary.statistics.positive, 2);
        assert_eq!(summary.statistics.negative, 1);
        assert_eq!(summary.statistics.positive_rate, "50.0%");
        assert_eq!(summary.recent[0].id, id);
    }

    #[tokio::test]
    async fn empty_store_has_no_rate() {
        let summary = FeedbackStore::default().summary().await;
        assert_eq!(summary.statistics.positive_rate, "N/A");
        assert!(summary.recent.is_empty());
    }

    #[tokio::test]
    async fn ring_evicts_oldest_and_recent_is_bounded() {
        let store = FeedbackStore::with_capacity(12);
        for i in 0..15 {
            store.record(submission(&format!("m{}", i), None, "x"), None).await.unwrap();
        }
        assert_eq!(store.len().await, 12);
        assert_eq!(store.summary().await.recent.len(), RECENT_LIMIT);
    }

    #[tokio::test]
    async fn long_content_is_truncated_and_previewed() {
        let store = FeedbackStore::default();
        let long = "é".repeat(600);
        store.record(submission("m", Some(FeedbackKind::Positive), &long), None).await.unwrap();
        let summary = store.summary().await;
        let preview = &summary.recent[0].content_preview;
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);

        let entries = store.entries.lock().await;
        assert_eq!(entries[0].message_content.chars().count(), MAX_CONTENT_CHARS);
    }
}
