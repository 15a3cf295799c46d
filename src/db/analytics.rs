//! Aggregation queries backing the analytics dashboard.
//!
//! All queries are scoped to one user. Grouped aggregates go through raw
//! SQL statements since SeaORM's query builder has no FILTER support.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ColumnTrait, DatabaseBackend, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, Statement,
};
use uuid::Uuid;

use crate::entity::job::{self, Entity as Job};
use crate::error::{AppError, AppResult};

use super::DbPool;

/// Count of jobs per status.
#[derive(Debug, FromQueryResult)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Per-job-type totals and average completion time.
#[derive(Debug, FromQueryResult)]
pub struct TypeStats {
    pub job_type: String,
    pub count: i64,
    pub avg_duration_secs: Option<f64>,
}

/// One day of job activity.
#[derive(Debug, FromQueryResult)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
}

#[derive(Debug, FromQueryResult)]
struct AvgDuration {
    avg_secs: Option<f64>,
}

impl DbPool {
    /// Jobs per status for one user, optionally since a cutoff.
    pub async fn job_status_counts(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<StatusCount>> {
        let mut sql = String::from(
            "SELECT status, COUNT(*) AS count FROM jobs WHERE user_id = $1",
        );
        let mut values: Vec<sea_orm::Value> = vec![user_id.into()];

        if let Some(since) = since {
            sql.push_str(" AND created_at >= $2");
            values.push(since.into());
        }
        sql.push_str(" GROUP BY status");

        let results = StatusCount::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            &sql,
            values,
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to count jobs by status: {}", e)))?;

        Ok(results)
    }

    /// Jobs per type with average completion time in seconds.
    pub async fn job_type_stats(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<TypeStats>> {
        let mut sql = String::from(
            "SELECT job_type, COUNT(*) AS count, \
             (AVG(EXTRACT(EPOCH FROM (completed_at - started_at))) \
              FILTER (WHERE status = 'completed' AND started_at IS NOT NULL \
                      AND completed_at IS NOT NULL))::double precision AS avg_duration_secs \
             FROM jobs WHERE user_id = $1",
        );
        let mut values: Vec<sea_orm::Value> = vec![user_id.into()];

        if let Some(since) = since {
            sql.push_str(" AND created_at >= $2");
            values.push(since.into());
        }
        sql.push_str(" GROUP BY job_type");

        let results = TypeStats::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            &sql,
            values,
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to aggregate jobs by type: {}", e)))?;

        Ok(results)
    }

    /// Daily totals for the trailing window.
    pub async fn daily_job_counts(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<DailyCount>> {
        let sql = "SELECT created_at::date AS day, \
                   COUNT(*) AS total, \
                   COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed \
                   FROM jobs WHERE user_id = $1 AND created_at >= $2 \
                   GROUP BY day ORDER BY day";

        let results = DailyCount::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            sql,
            [user_id.into(), since.into()],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to aggregate daily job counts: {}", e)))?;

        Ok(results)
    }

    /// Average completion time across all completed jobs, in seconds.
    pub async fn avg_job_duration_secs(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Option<f64>> {
        let mut sql = String::from(
            "SELECT (AVG(EXTRACT(EPOCH FROM (completed_at - started_at))))::double precision \
             AS avg_secs FROM jobs \
             WHERE user_id = $1 AND status = 'completed' \
             AND started_at IS NOT NULL AND completed_at IS NOT NULL",
        );
        let mut values: Vec<sea_orm::Value> = vec![user_id.into()];

        if let Some(since) = since {
            sql.push_str(" AND created_at >= $2");
            values.push(since.into());
        }

        let result = AvgDuration::find_by_statement(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            &sql,
            values,
        ))
        .one(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to average job durations: {}", e)))?;

        Ok(result.and_then(|r| r.avg_secs))
    }

    /// Every job in the window, newest first.
    ///
    /// Backs the per-job dashboard table and the model usage counters, which
    /// need the full rows rather than an aggregate.
    pub async fn jobs_since(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<job::Model>> {
        let mut select = Job::find().filter(job::Column::UserId.eq(user_id));

        if let Some(since) = since {
            select = select.filter(job::Column::CreatedAt.gte(since));
        }

        let results = select
            .order_by_desc(job::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list jobs for analytics: {}", e)))?;

        Ok(results)
    }
}
