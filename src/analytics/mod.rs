use chrono::{ DateTime, Duration as ChronoDuration, Timelike, Utc };
use log::debug;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };
use std::collections::{ BTreeMap, HashMap, VecDeque };
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::feedback::event_id;

const MAX_EVENTS: usize = 5000;
const MAX_SESSIONS: usize = 5000;
const RECENT_LIMIT: usize = 20;
const TOP_TOPICS: usize = 5;

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("projects", &["project", "built", "work", "portfolio", "case study", "ems", "whatsapp", "naba"]),
    (
        "skills",
        &["skill", "tech", "technology", "stack", "language", "framework", "react", "node", "python"],
    ),
    ("contact", &["contact", "hire", "work with", "email", "reach", "available"]),
    ("experience", &["experience", "years", "background", "career"]),
    ("general", &["hello", "hi", "hey", "help", "what can you"]),
];

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid event type")]
    InvalidEvent(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ChatOpened,
    ChatClosed,
    MessageSent,
    ResponseReceived,
    QuickReplyClicked,
    ChatCleared,
}

impl FromStr for EventKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat_opened" => Ok(EventKind::ChatOpened),
            "chat_closed" => Ok(EventKind::ChatClosed),
            "message_sent" => Ok(EventKind::MessageSent),
            "response_received" => Ok(EventKind::ResponseReceived),
            "quick_reply_clicked" => Ok(EventKind::QuickReplyClicked),
            "chat_cleared" => Ok(EventKind::ChatCleared),
            other => Err(AnalyticsError::InvalidEvent(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::ChatOpened => "chat_opened",
            EventKind::ChatClosed => "chat_closed",
            EventKind::MessageSent => "message_sent",
            EventKind::ResponseReceived => "response_received",
            EventKind::QuickReplyClicked => "quick_reply_clicked",
            EventKind::ChatCleared => "chat_cleared",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSubmission {
    #[serde(default)]
    pub event: Option<String>,
    pub session_id: Option<String>,
    pub data: Option<Map<String, Value>>,
}

#[derive(Clone, Debug)]
pub struct AnalyticsEvent {
    pub id: String,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
    pub topic: Option<&'static str>,
    pub data: Map<String, Value>,
}

#[derive(Debug)]
struct SessionMetrics {
    message_count: usize,
    last_activity: DateTime<Utc>,
    response_time_total: f64,
    response_samples: u64,
}

#[derive(Default)]
struct AnalyticsState {
    events: VecDeque<AnalyticsEvent>,
    sessions: HashMap<String, SessionMetrics>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStats {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub avg_messages_per_conversation: f64,
    pub avg_response_time: u64,
    pub popular_topics: Vec<TopicCount>,
}

#[derive(Debug, Serialize)]
pub struct RecentEvent {
    pub id: String,
    pub event: EventKind,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub statistics: ConversationStats,
    pub recent_events: Vec<RecentEvent>,
    /// Hour of day (UTC) to event count, over the last 24 hours.
    pub hourly_distribution: BTreeMap<u32, usize>,
    pub event_count: usize,
    pub unique_sessions: usize,
}

/// First topic whose keyword list matches, else `other`.
pub fn categorize_message(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    TOPIC_KEYWORDS.iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(topic, _)| *topic)
        .unwrap_or("other")
}

pub struct AnalyticsStore {
    state: Mutex<AnalyticsState>,
    max_events: usize,
}

impl Default for AnalyticsStore {
    fn default() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }
}

impl AnalyticsStore {
    pub fn with_capacity(max_events: usize) -> Self {
        Self { state: Mutex::new(AnalyticsState::default()), max_events: max_events.max(1) }
    }

    pub async fn track(&self, submission: AnalyticsSubmission) -> Result<String, AnalyticsError> {
        let kind: EventKind = submission.event.as_deref().unwrap_or_default().parse()?;
        let now = Utc::now();
        let mut data = submission.data.unwrap_or_default();

        let topic = data
            .get("messageContent")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(categorize_message);
        if let Some(topic) = topic {
            data.insert("topic".to_string(), Value::String(topic.to_string()));
        }

        let event = AnalyticsEvent {
            id: event_id("evt"),
            kind,
            timestamp: now,
            session_id: submission.session_id.filter(|s| !s.is_empty()),
            topic,
            data,
        };
        let id = event.id.clone();
        debug!("Analytics event {} ({})", kind, id);

        let mut state = self.state.lock().await;
        if let Some(session_id) = &event.session_id {
            if !state.sessions.contains_key(session_id) && state.sessions.len() >= MAX_SESSIONS {
                evict_idlest_session(&mut state.sessions);
            }
            let metrics = state.sessions.entry(session_id.clone()).or_insert_with(|| SessionMetrics {
                message_count: 0,
                last_activity: now,
                response_time_total: 0.0,
                response_samples: 0,
            });
            match kind {
                EventKind::MessageSent => {
                    metrics.message_count += 1;
                    metrics.last_activity = now;
                }
                EventKind::ResponseReceived => {
                    if let Some(ms) = event.data.get("responseTime").and_then(Value::as_f64) {
                        metrics.response_time_total += ms;
                        metrics.response_samples += 1;
                    }
                }
                _ => {}
            }
        }

        state.events.push_back(event);
        while state.events.len() > self.max_events {
            state.events.pop_front();
        }
        Ok(id)
    }

    pub async fn summary(&self) -> AnalyticsSummary {
        self.summary_at(Utc::now()).await
    }

    async fn summary_at(&self, now: DateTime<Utc>) -> AnalyticsSummary {
        let state = self.state.lock().await;

        let total_conversations = state.sessions.len();
        let total_messages: usize = state.sessions
            .values()
            .map(|s| s.message_count)
            .sum();
        let (response_total, response_samples) = state.sessions
            .values()
            .fold((0.0, 0u64), |(total, n), s| (total + s.response_time_total, n + s.response_samples));
        let avg_response_time = if response_samples == 0 {
            0
        } else {
            (response_total / (response_samples as f64)).round().max(0.0) as u64
        };

        let mut topic_counts: HashMap<&'static str, usize> = HashMap::new();
        for event in state.events.iter().filter(|e| e.kind == EventKind::MessageSent) {
            *topic_counts.entry(event.topic.unwrap_or("other")).or_insert(0) += 1;
        }
        let mut popular_topics: Vec<TopicCount> = topic_counts
            .into_iter()
            .map(|(topic, count)| TopicCount { topic: topic.to_string(), count })
            .collect();
        popular_topics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.topic.cmp(&b.topic)));
        popular_topics.truncate(TOP_TOPICS);

        let recent_events = state.events
            .iter()
            .rev()
            .take(RECENT_LIMIT)
            .map(|e| RecentEvent {
                id: e.id.clone(),
                event: e.kind,
                timestamp: e.timestamp.to_rfc3339(),
                topic: e.topic,
            })
            .collect();

        let window_start = now - ChronoDuration::hours(24);
        let mut hourly_distribution = BTreeMap::new();
        for event in state.events.iter().filter(|e| e.timestamp > window_start) {
            *hourly_distribution.entry(event.timestamp.hour()).or_insert(0) += 1;
        }

        AnalyticsSummary {
            statistics: ConversationStats {
                total_conversations,
                total_messages,
                avg_messages_per_conversation: if total_conversations > 0 {
                    (total_messages as f64) / (total_conversations as f64)
                } else {
                    0.0
                },
                avg_response_time,
                popular_topics,
            },
            recent_events,
            hourly_distribution,
            event_count: state.events.len(),
            unique_sessions: total_conversations,
        }
    }
}

fn evict_idlest_session(sessions: &mut HashMap<String, SessionMetrics>) {
    let idlest = sessions
        .iter()
        .min_by_key(|(_, m)| m.last_activity)
        .map(|(id, _)| id.clone());
    if let Some(id) = idlest {
        sessions.remove(&id);
    }
}
