//! Postgres-backed store. Every port call is one SQL statement, so row-level
//! locking in Postgres serialises concurrent callers across replicas.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::core::{HostStore, LeaseStore, StoreError};
use crate::util::serde::{HostRecord, HostState, TaskLease};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

static ADJUST_IDLE_CORES: &str = r"
UPDATE host_resource
SET idle_cores = idle_cores + $1
WHERE host_id = $2
";

static SELECT_HOST: &str = r"
SELECT host_id, idle_cores, state, last_ping_ms
FROM host_resource
WHERE host_id = $1
";

static MARK_STALE_HOSTS_DOWN: &str = r"
UPDATE host_resource
SET state = 'DOWN'
WHERE state = 'UP'
    AND last_ping_ms < $1
";

static UPSERT_HOST: &str = r"
INSERT INTO host_resource (host_id, idle_cores, state, last_ping_ms)
VALUES ($1, $2, 'UP', $3)
ON CONFLICT (host_id) DO UPDATE
SET idle_cores = EXCLUDED.idle_cores,
    state = 'UP',
    last_ping_ms = EXCLUDED.last_ping_ms
";

static RECORD_PING: &str = r"
UPDATE host_resource
SET last_ping_ms = $1,
    state = 'UP'
WHERE host_id = $2
";

static REGISTER_TASK: &str = r"
INSERT INTO task_lease (task_name, lock_token, last_run_ms, timeout_ms)
VALUES ($1, 0, 0, $2)
ON CONFLICT (task_name) DO UPDATE
SET timeout_ms = EXCLUDED.timeout_ms
";

static ACQUIRE_EXPIRING: &str = r"
UPDATE task_lease
SET lock_token = $1,
    last_run_ms = $1
WHERE task_name = $2
    AND (lock_token = 0 OR $1 - lock_token > $3)
";

static ACQUIRE_SPACED: &str = r"
UPDATE task_lease
SET lock_token = $1,
    last_run_ms = $1
WHERE task_name = $2
    AND lock_token = 0
    AND $1 - last_run_ms > $3
";

static CLEAR_LOCK: &str = r"
UPDATE task_lease
SET lock_token = 0
WHERE task_name = $1
";

static CLEAR_LOCK_IF_TOKEN: &str = r"
UPDATE task_lease
SET lock_token = 0
WHERE task_name = $1
    AND lock_token = $2
    AND lock_token <> 0
";

static SELECT_LEASE: &str = r"
SELECT task_name, lock_token, last_run_ms, timeout_ms
FROM task_lease
WHERE task_name = $1
";

/// Store over a shared Postgres database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `url`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if no connection could be established.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(map_sqlx_error)?;
        tracing::info!("connected to postgres store (max {} connections)", max_connections);
        Ok(Self { pool })
    }

    /// Underlying pool.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Migration statements for the host and lease tables.
    pub fn migrations() -> &'static [&'static str] {
        &[
            r"
CREATE TABLE IF NOT EXISTS host_resource (
    host_id TEXT PRIMARY KEY,
    idle_cores BIGINT NOT NULL,
    state TEXT NOT NULL DEFAULT 'UP',
    last_ping_ms BIGINT NOT NULL DEFAULT 0
)",
            r"
CREATE INDEX IF NOT EXISTS idx_host_resource_state_ping
    ON host_resource (state, last_ping_ms)",
            r"
CREATE TABLE IF NOT EXISTS task_lease (
    task_name TEXT PRIMARY KEY,
    lock_token BIGINT NOT NULL DEFAULT 0,
    last_run_ms BIGINT NOT NULL DEFAULT 0,
    timeout_ms BIGINT NOT NULL CHECK (timeout_ms > 0)
)",
        ]
    }

    /// Apply [`PostgresStore::migrations`].
    ///
    /// # Errors
    ///
    /// Any store fault while executing the DDL.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in Self::migrations() {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    /// Register (or re-register) a host as `UP`.
    ///
    /// # Errors
    ///
    /// Any store fault.
    pub async fn register_host(
        &self,
        host_id: &str,
        idle_cores: i64,
        last_ping_ms: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(UPSERT_HOST)
            .bind(host_id)
            .bind(idle_cores)
            .bind(to_db(last_ping_ms))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Heartbeat: stamp the ping time and bring the host back `UP`.
    ///
    /// # Errors
    ///
    /// Any store fault.
    pub async fn record_ping(&self, host_id: &str, now_ms: u64) -> Result<bool, StoreError> {
        let result = sqlx::query(RECORD_PING)
            .bind(to_db(now_ms))
            .bind(host_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn execute(&self, query: PgQuery<'_>) -> Result<u64, StoreError> {
        let result = query.execute(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HostStore for PostgresStore {
    async fn adjust_idle_cores(&self, host_id: &str, delta: i64) -> Result<u64, StoreError> {
        self.execute(sqlx::query(ADJUST_IDLE_CORES).bind(delta).bind(host_id))
            .await
    }

    async fn get_host(&self, host_id: &str) -> Result<Option<HostRecord>, StoreError> {
        let row = sqlx::query(SELECT_HOST)
            .bind(host_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|row| -> Result<HostRecord, StoreError> {
            let state: String = row.try_get("state").map_err(map_sqlx_error)?;
            Ok(HostRecord {
                host_id: row.try_get("host_id").map_err(map_sqlx_error)?,
                idle_cores: row.try_get("idle_cores").map_err(map_sqlx_error)?,
                state: state.parse::<HostState>().map_err(StoreError::Backend)?,
                last_ping_ms: from_db(row.try_get("last_ping_ms").map_err(map_sqlx_error)?),
            })
        })
        .transpose()
    }

    async fn mark_stale_hosts_down(&self, cutoff_ms: u64) -> Result<u64, StoreError> {
        self.execute(sqlx::query(MARK_STALE_HOSTS_DOWN).bind(to_db(cutoff_ms)))
            .await
    }
}

#[async_trait]
impl LeaseStore for PostgresStore {
    async fn register_task(&self, task_name: &str, timeout_ms: u64) -> Result<(), StoreError> {
        self.execute(
            sqlx::query(REGISTER_TASK)
                .bind(task_name)
                .bind(to_db(timeout_ms)),
        )
        .await?;
        Ok(())
    }

    async fn acquire_expiring(
        &self,
        task_name: &str,
        now_ms: u64,
        timeout_ms: u64,
    ) -> Result<u64, StoreError> {
        self.execute(
            sqlx::query(ACQUIRE_EXPIRING)
                .bind(to_db(now_ms))
                .bind(task_name)
                .bind(to_db(timeout_ms)),
        )
        .await
    }

    async fn acquire_spaced(
        &self,
        task_name: &str,
        now_ms: u64,
        min_interval_ms: u64,
    ) -> Result<u64, StoreError> {
        self.execute(
            sqlx::query(ACQUIRE_SPACED)
                .bind(to_db(now_ms))
                .bind(task_name)
                .bind(to_db(min_interval_ms)),
        )
        .await
    }

    async fn clear_lock(&self, task_name: &str) -> Result<u64, StoreError> {
        self.execute(sqlx::query(CLEAR_LOCK).bind(task_name)).await
    }

    async fn clear_lock_if_token(&self, task_name: &str, token: u64) -> Result<u64, StoreError> {
        self.execute(
            sqlx::query(CLEAR_LOCK_IF_TOKEN)
                .bind(task_name)
                .bind(to_db(token)),
        )
        .await
    }

    async fn get_lease(&self, task_name: &str) -> Result<Option<TaskLease>, StoreError> {
        let row = sqlx::query(SELECT_LEASE)
            .bind(task_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|row| -> Result<TaskLease, StoreError> {
            Ok(TaskLease {
                task_name: row.try_get("task_name").map_err(map_sqlx_error)?,
                lock_token: from_db(row.try_get("lock_token").map_err(map_sqlx_error)?),
                last_run_ms: from_db(row.try_get("last_run_ms").map_err(map_sqlx_error)?),
                timeout_ms: from_db(row.try_get("timeout_ms").map_err(map_sqlx_error)?),
            })
        })
        .transpose()
    }
}

/// Milliseconds are stored as BIGINT.
fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Split sqlx errors into the store fault kinds.
pub fn map_sqlx_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            StoreError::Integrity(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}
