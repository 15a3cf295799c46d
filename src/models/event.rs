//! WebSocket event types for real-time job updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JobStatus, JobType};

/// WebSocket event sent to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job was created.
    JobCreated(JobCreatedPayload),
    /// A job reported progress.
    JobProgress(JobProgressPayload),
    /// A job reached a terminal state.
    JobFinished(JobFinishedPayload),
}

/// Payload for job_created events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreatedPayload {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub job_type: JobType,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for job_progress events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressPayload {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub status: JobStatus,
    pub progress_percentage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload for job_finished events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFinishedPayload {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Wrapper that includes timestamp with every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEventMessage {
    #[serde(flatten)]
    pub event: JobEvent,
    pub timestamp: DateTime<Utc>,
}

impl JobEventMessage {
    /// Create a new event message with the current timestamp.
    pub fn new(event: JobEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

impl JobEvent {
    /// Create a job_created event.
    pub fn created(job_id: Uuid, user_id: Uuid, job_type: JobType, title: String) -> Self {
        JobEvent::JobCreated(JobCreatedPayload {
            job_id,
            user_id,
            job_type,
            title,
            created_at: Utc::now(),
        })
    }

    /// Create a job_progress event.
    pub fn progress(
        job_id: Uuid,
        user_id: Uuid,
        status: JobStatus,
        progress_percentage: i32,
        message: Option<String>,
    ) -> Self {
        JobEvent::JobProgress(JobProgressPayload {
            job_id,
            user_id,
            status,
            progress_percentage,
            message,
        })
    }

    /// Create a job_finished event for a terminal state.
    pub fn finished(
        job_id: Uuid,
        user_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Self {
        JobEvent::JobFinished(JobFinishedPayload {
            job_id,
            user_id,
            status,
            error_message,
            completed_at: Utc::now(),
        })
    }

    /// Owner of the job this event concerns. WebSocket sessions drop events
    /// for other users' jobs.
    pub fn user_id(&self) -> Uuid {
        match self {
            JobEvent::JobCreated(p) => p.user_id,
            JobEvent::JobProgress(p) => p.user_id,
            JobEvent::JobFinished(p) => p.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_owner() {
        let user_id = Uuid::now_v7();
        let event = JobEvent::progress(Uuid::now_v7(), user_id, JobStatus::Processing, 40, None);
        assert_eq!(event.user_id(), user_id);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let message = JobEventMessage::new(JobEvent::created(
            Uuid::now_v7(),
            Uuid::now_v7(),
            JobType::TextToSpeech,
            "Lecture intro".to_string(),
        ));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "job_created");
        assert_eq!(json["payload"]["job_type"], "text_to_speech");
        assert!(json["timestamp"].is_string());
    }
}
