//! Analytics dashboard endpoint.
//!
//! Aggregates the authenticated user's job history into the payload the
//! dashboard renders: summary counters, status and model breakdowns, a
//! per-job performance table, and a 30-day daily series. Counts come from
//! grouped SQL; the table and model usage need full rows and read them in
//! one window query.

use std::collections::BTreeMap;

use actix_web::{get, web, HttpResponse};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entity::job;
use crate::error::{AppError, AppResult};
use crate::models::{JobStatus, ServiceModelInfo};

/// Days covered by the daily performance series.
const DAILY_WINDOW_DAYS: i64 = 30;

/// Rows in the recent jobs block.
const RECENT_JOBS_LIMIT: usize = 10;

/// Usage counters keyed by service name, then model name.
pub type ModelUsage = BTreeMap<String, BTreeMap<String, u64>>;

/// Query parameters for the dashboard.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DashboardQuery {
    /// One of 7d, 30d, 90d, all. Defaults to all.
    #[serde(default)]
    pub time_range: Option<String>,
}

/// Headline counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub in_progress_jobs: u64,
    /// Completed / total, as a percentage rounded to two decimals.
    pub success_rate: f64,
    /// Mean completion time in seconds for completed jobs.
    pub avg_processing_time: f64,
}

/// Jobs per status in the selected window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusBreakdown {
    pub completed: u64,
    pub failed: u64,
    pub pending: u64,
    pub processing: u64,
    pub cancelled: u64,
}

/// One row of the per-job performance table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobPerformanceRow {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub job_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between start and completion, when both are known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub duration_formatted: String,
    pub llm_model: String,
    pub tts_model: String,
    pub video_model: String,
    pub models_used: BTreeMap<String, String>,
    pub model_details: BTreeMap<String, ServiceModelInfo>,
}

/// One day of the trailing series, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyPerformance {
    /// Calendar date, YYYY-MM-DD.
    pub date: String,
    pub total_jobs: u64,
    pub completed: u64,
    pub failed: u64,
    pub success_rate: f64,
}

/// Compact recent job entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecentJobEntry {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_metadata: Option<JsonValue>,
}

/// Per-type aggregate used for benchmark comparisons.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobTypeBenchmark {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_duration_secs: Option<f64>,
}

/// Benchmark comparison block.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BenchmarkData {
    pub avg_processing_time: f64,
    pub success_rate: f64,
    pub total_jobs: u64,
    pub models_used: ModelUsageSummary,
    pub by_job_type: BTreeMap<String, JobTypeBenchmark>,
}

/// How many distinct services and models appear in the window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ModelUsageSummary {
    pub service_count: u64,
    pub total_model_types: u64,
}

/// Full dashboard payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub summary: DashboardSummary,
    pub status_breakdown: StatusBreakdown,
    pub model_usage: ModelUsage,
    pub job_performance_table: Vec<JobPerformanceRow>,
    pub daily_performance: Vec<DailyPerformance>,
    pub recent_jobs: Vec<RecentJobEntry>,
    pub benchmark_data: BenchmarkData,
    pub time_range: String,
}

/// Configure analytics routes under /api/analytics.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/analytics").service(dashboard));
}

fn parse_time_range(raw: &str) -> AppResult<Option<Duration>> {
    match raw {
        "7d" => Ok(Some(Duration::days(7))),
        "30d" => Ok(Some(Duration::days(30))),
        "90d" => Ok(Some(Duration::days(90))),
        "all" => Ok(None),
        other => Err(AppError::InvalidInput(format!(
            "Invalid time_range '{}'. Use 7d, 30d, 90d, or all.",
            other
        ))),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn duration_secs(job: &job::Model) -> Option<f64> {
    match (job.started_at, job.completed_at) {
        (Some(start), Some(end)) => {
            let secs = (end - start).num_milliseconds() as f64 / 1000.0;
            Some(secs.max(0.0))
        }
        _ => None,
    }
}

fn format_duration(duration: Option<f64>) -> String {
    match duration {
        Some(secs) => format!("{}m {}s", (secs / 60.0) as u64, (secs % 60.0) as u64),
        None => "N/A".to_string(),
    }
}

/// Parse the service_metadata column into typed per-service model info.
fn service_models(metadata: Option<&JsonValue>) -> BTreeMap<String, ServiceModelInfo> {
    let mut models = BTreeMap::new();
    if let Some(JsonValue::Object(map)) = metadata {
        for (service, value) in map {
            if let Ok(info) = serde_json::from_value::<ServiceModelInfo>(value.clone()) {
                models.insert(service.clone(), info);
            }
        }
    }
    models
}

fn performance_row(job: &job::Model) -> JobPerformanceRow {
    let duration = duration_secs(job);
    let details = service_models(job.service_metadata.as_ref());

    let mut llm_model = "N/A".to_string();
    let mut tts_model = "N/A".to_string();
    let mut video_model = "N/A".to_string();
    let mut models_used = BTreeMap::new();
    for (service, info) in &details {
        match service.as_str() {
            "llm" => llm_model = info.model_name.clone(),
            "tts" => tts_model = info.model_name.clone(),
            "video" => video_model = info.model_name.clone(),
            _ => {}
        }
        models_used.insert(service.clone(), info.model_name.clone());
    }

    JobPerformanceRow {
        id: job.id,
        title: job.title.clone(),
        status: job.status.clone(),
        job_type: job.job_type.clone(),
        created_at: job.created_at,
        completed_at: job.completed_at,
        duration,
        duration_formatted: format_duration(duration),
        llm_model,
        tts_model,
        video_model,
        models_used,
        model_details: details,
    }
}

/// Analytics dashboard over the user's jobs.
#[utoipa::path(
    get,
    path = "/api/analytics/dashboard",
    tag = "Analytics",
    params(
        ("time_range" = Option<String>, Query, description = "7d, 30d, 90d, or all (default)")
    ),
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse),
        (status = 400, description = "Invalid time_range"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = []))
)]
#[get("/dashboard")]
pub async fn dashboard(
    pool: web::Data<DbPool>,
    auth: AuthUser,
    query: web::Query<DashboardQuery>,
) -> AppResult<HttpResponse> {
    let time_range = query.time_range.clone().unwrap_or_else(|| "all".to_string());
    let since = parse_time_range(&time_range)?.map(|window| Utc::now() - window);

    let status_counts = pool.job_status_counts(auth.user_id, since).await?;
    let avg_secs = pool.avg_job_duration_secs(auth.user_id, since).await?;
    let type_stats = pool.job_type_stats(auth.user_id, since).await?;
    let jobs = pool.jobs_since(auth.user_id, since).await?;

    let count_for = |status: JobStatus| -> u64 {
        status_counts
            .iter()
            .find(|c| c.status == status.as_str())
            .map(|c| c.count.max(0) as u64)
            .unwrap_or(0)
    };
    let completed = count_for(JobStatus::Completed);
    let failed = count_for(JobStatus::Failed);
    let pending = count_for(JobStatus::Pending);
    let processing = count_for(JobStatus::Processing);
    let cancelled = count_for(JobStatus::Cancelled);
    let total: u64 = completed + failed + pending + processing + cancelled;

    let success_rate = if total > 0 {
        round2(completed as f64 / total as f64 * 100.0)
    } else {
        0.0
    };
    let avg_processing_time = round2(avg_secs.unwrap_or(0.0));

    let mut model_usage: ModelUsage = BTreeMap::new();
    for job in &jobs {
        for (service, info) in service_models(job.service_metadata.as_ref()) {
            *model_usage
                .entry(service)
                .or_default()
                .entry(info.model_name)
                .or_insert(0) += 1;
        }
    }

    let job_performance_table: Vec<JobPerformanceRow> =
        jobs.iter().map(performance_row).collect();

    // The daily series always covers the trailing 30 days regardless of the
    // window filter, with explicit zero rows for idle days.
    let daily_counts = pool
        .daily_job_counts(auth.user_id, Utc::now() - Duration::days(DAILY_WINDOW_DAYS))
        .await?;
    let today = Utc::now().date_naive();
    let daily_performance: Vec<DailyPerformance> = (0..DAILY_WINDOW_DAYS)
        .map(|offset| {
            let day = today - Duration::days(offset);
            let counts = daily_counts.iter().find(|c| c.day == day);
            let day_total = counts.map(|c| c.total.max(0) as u64).unwrap_or(0);
            let day_completed = counts.map(|c| c.completed.max(0) as u64).unwrap_or(0);
            let day_failed = counts.map(|c| c.failed.max(0) as u64).unwrap_or(0);
            DailyPerformance {
                date: day.format("%Y-%m-%d").to_string(),
                total_jobs: day_total,
                completed: day_completed,
                failed: day_failed,
                success_rate: if day_total > 0 {
                    round2(day_completed as f64 / day_total as f64 * 100.0)
                } else {
                    0.0
                },
            }
        })
        .collect();

    let recent_jobs: Vec<RecentJobEntry> = jobs
        .iter()
        .take(RECENT_JOBS_LIMIT)
        .map(|job| RecentJobEntry {
            id: job.id,
            title: job.title.clone(),
            status: job.status.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
            processing_time: duration_secs(job),
            service_metadata: job.service_metadata.clone(),
        })
        .collect();

    let by_job_type: BTreeMap<String, JobTypeBenchmark> = type_stats
        .into_iter()
        .map(|st| {
            (
                st.job_type,
                JobTypeBenchmark {
                    count: st.count.max(0) as u64,
                    avg_duration_secs: st.avg_duration_secs.map(round2),
                },
            )
        })
        .collect();

    let benchmark_data = BenchmarkData {
        avg_processing_time,
        success_rate,
        total_jobs: total,
        models_used: ModelUsageSummary {
            service_count: model_usage.len() as u64,
            total_model_types: model_usage.values().map(|m| m.len() as u64).sum(),
        },
        by_job_type,
    };

    let response = DashboardResponse {
        summary: DashboardSummary {
            total_jobs: total,
            completed_jobs: completed,
            failed_jobs: failed,
            in_progress_jobs: pending + processing,
            success_rate,
            avg_processing_time,
        },
        status_breakdown: StatusBreakdown {
            completed,
            failed,
            pending,
            processing,
            cancelled,
        },
        model_usage,
        job_performance_table,
        daily_performance,
        recent_jobs,
        benchmark_data,
        time_range,
    };
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_values() {
        assert_eq!(parse_time_range("7d").unwrap(), Some(Duration::days(7)));
        assert_eq!(parse_time_range("30d").unwrap(), Some(Duration::days(30)));
        assert_eq!(parse_time_range("90d").unwrap(), Some(Duration::days(90)));
        assert_eq!(parse_time_range("all").unwrap(), None);
        assert!(parse_time_range("14d").is_err());
        assert!(parse_time_range("").is_err());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Some(95.0)), "1m 35s");
        assert_eq!(format_duration(Some(0.4)), "0m 0s");
        assert_eq!(format_duration(Some(3600.0)), "60m 0s");
        assert_eq!(format_duration(None), "N/A");
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(33.333_333), 33.33);
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn service_models_skips_malformed_entries() {
        let metadata = serde_json::json!({
            "llm": {"model_name": "llama", "model_type": "text-generation"},
            "tts": "not an object",
        });
        let models = service_models(Some(&metadata));
        assert_eq!(models.len(), 1);
        assert_eq!(models["llm"].model_name, "llama");
    }
}
