//! Client/server backend built on PostgreSQL.
//!
//! Conditional `UPDATE`s keep status writes monotonic under concurrent
//! writers; queue claims use `FOR UPDATE SKIP LOCKED` so several worker
//! processes can poll the same queue without double-dispatch.

use async_trait::async_trait;
use inquiry_core::research::{JobStatus, JobSummary, ResearchJob, StepStatus};
use inquiry_core::types::{JobId, Timestamp};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use crate::error::StoreError;
use crate::models::job::{
    from_count, JobRow, StepRow, SummaryRow, JOB_COLUMNS, STEP_COLUMNS, SUMMARY_COLUMNS,
};
use crate::store::{ExecutionQueue, JobStore, QueuedExecution};

/// [`JobStore`] and [`ExecutionQueue`] over a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by `#[sqlx::test]`).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations/postgres").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn missing_or_conflict(
        tx: &mut Transaction<'_, Postgres>,
        id: JobId,
        attempted: JobStatus,
    ) -> StoreError {
        let current: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM research_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await;
        match current {
            Ok(None) => StoreError::NotFound(id),
            Ok(Some(status)) => StoreError::Conflict(format!(
                "research job {id} is {status}, cannot write {attempted}"
            )),
            Err(err) => StoreError::Database(err),
        }
    }

    async fn upsert_steps(
        tx: &mut Transaction<'_, Postgres>,
        job: &ResearchJob,
    ) -> Result<(), StoreError> {
        for step in &job.steps {
            sqlx::query(
                "INSERT INTO research_steps \
                     (job_id, name, position, status, started_at, finished_at, detail, output) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (job_id, name) DO UPDATE SET \
                     status = EXCLUDED.status, \
                     finished_at = EXCLUDED.finished_at, \
                     detail = EXCLUDED.detail, \
                     output = EXCLUDED.output \
                 WHERE research_steps.status = $9 OR research_steps.status = EXCLUDED.status",
            )
            .bind(job.id)
            .bind(step.name.as_str())
            .bind(step.name.index() as i32)
            .bind(step.status.as_str())
            .bind(step.started_at)
            .bind(step.finished_at)
            .bind(&step.detail)
            .bind(step.output.as_ref().map(Json))
            .bind(StepStatus::Started.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                StoreError::from_write(e, || {
                    format!("step {} of research job {} is out of order", step.name, job.id)
                })
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &ResearchJob) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO research_jobs \
                 (id, topic, status, current_step_index, total_steps, \
                  result, error, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(job.id)
        .bind(&job.topic)
        .bind(job.status.as_str())
        .bind(from_count(job.current_step_index))
        .bind(from_count(job.total_steps))
        .bind(job.result.as_ref().map(Json))
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_write(e, || format!("research job {} already exists", job.id)))?;

        Self::upsert_steps(&mut tx, job).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, job: &ResearchJob) -> Result<(), StoreError> {
        let [pred_a, pred_b] = job.status.allowed_predecessors();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE research_jobs SET \
                 status = $1, \
                 current_step_index = GREATEST(current_step_index, $2), \
                 result = COALESCE($3, result), \
                 error = COALESCE($4, error), \
                 updated_at = $5 \
             WHERE id = $6 AND status IN ($7, $8)",
        )
        .bind(job.status.as_str())
        .bind(from_count(job.current_step_index))
        .bind(job.result.as_ref().map(Json))
        .bind(&job.error)
        .bind(job.updated_at)
        .bind(job.id)
        .bind(pred_a.as_str())
        .bind(pred_b.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::missing_or_conflict(&mut tx, job.id, job.status).await);
        }

        Self::upsert_steps(&mut tx, job).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<ResearchJob, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {JOB_COLUMNS} FROM research_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let query = format!(
            "SELECT {STEP_COLUMNS} FROM research_steps WHERE job_id = $1 ORDER BY position"
        );
        let steps = sqlx::query_as::<_, StepRow>(&query)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        row.into_job(steps)
    }

    async fn list(&self) -> Result<Vec<JobSummary>, StoreError> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM research_jobs ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, SummaryRow>(&query)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SummaryRow::into_summary)
            .collect()
    }

    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM research_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM research_jobs")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn mark_started(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE research_jobs SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(JobStatus::InProgress.as_str())
        .bind(at)
        .bind(id)
        .bind(JobStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return match Self::missing_or_conflict(&mut tx, id, JobStatus::InProgress).await {
                StoreError::Conflict(_) => Ok(false),
                err => Err(err),
            };
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn list_stale(&self, cutoff: Timestamp) -> Result<Vec<JobId>, StoreError> {
        let ids: Vec<JobId> = sqlx::query_scalar(
            "SELECT id FROM research_jobs \
             WHERE status = $1 AND updated_at < $2 \
             ORDER BY updated_at ASC",
        )
        .bind(JobStatus::InProgress.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_orphaned(&self, cutoff: Timestamp) -> Result<Vec<JobId>, StoreError> {
        let ids: Vec<JobId> = sqlx::query_scalar(
            "SELECT j.id FROM research_jobs j \
             WHERE j.status = $1 AND j.updated_at < $2 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM execution_queue q \
                   WHERE q.job_id = j.id AND q.finished_at IS NULL \
               ) \
             ORDER BY j.updated_at ASC",
        )
        .bind(JobStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionQueue for PgJobStore {
    async fn enqueue(&self, job_id: JobId, at: Timestamp) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO execution_queue (job_id, enqueued_at) VALUES ($1, $2) \
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::NotFound(job_id)
            }
            _ => StoreError::Database(e),
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn claim_next(
        &self,
        worker: &str,
        at: Timestamp,
    ) -> Result<Option<QueuedExecution>, StoreError> {
        let entry = sqlx::query_as::<_, QueuedExecution>(
            "UPDATE execution_queue \
             SET claimed_by = $1, claimed_at = $2 \
             WHERE id = ( \
                 SELECT id FROM execution_queue \
                 WHERE claimed_at IS NULL \
                 ORDER BY id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING id, job_id, enqueued_at",
        )
        .bind(worker)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn finish(&self, entry_id: i64, at: Timestamp) -> Result<(), StoreError> {
        sqlx::query("UPDATE execution_queue SET finished_at = $1 WHERE id = $2")
            .bind(at)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release_stale_claims(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE execution_queue \
             SET claimed_by = NULL, claimed_at = NULL \
             WHERE claimed_at < $1 AND finished_at IS NULL \
               AND job_id IN (SELECT id FROM research_jobs WHERE status = $2)",
        )
        .bind(cutoff)
        .bind(JobStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM execution_queue WHERE claimed_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
