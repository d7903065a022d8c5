//! Connection pool, migrations and the single sqlx error mapping.
//!
//! | sqlx error | `TailorError` |
//! |------------|---------------|
//! | `RowNotFound` | `NotFound` |
//! | anything else | `PersistenceFailure` |

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use tailor_core::TailorError;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    // Fail fast on an unreachable database instead of at the first claim.
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(max_connections, "database pool ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("migrations applied");
    Ok(())
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> TailorError {
    match err {
        sqlx::Error::RowNotFound => TailorError::NotFound(format!("no row in {operation}")),
        sqlx::Error::Database(db_err) => TailorError::PersistenceFailure(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            TailorError::PersistenceFailure(format!("connection pool closed in {operation}"))
        }
        other => TailorError::PersistenceFailure(format!("sqlx error in {operation}: {other}")),
    }
}

/// `attempts` and `max_attempts` are `INTEGER` columns.
pub(crate) fn to_u32(operation: &str, value: i32) -> Result<u32, TailorError> {
    u32::try_from(value).map_err(|_| {
        TailorError::PersistenceFailure(format!("negative counter {value} in {operation}"))
    })
}

/// `COUNT(*)` comes back as `BIGINT`.
pub(crate) fn to_u64(operation: &str, value: i64) -> Result<u64, TailorError> {
    u64::try_from(value).map_err(|_| {
        TailorError::PersistenceFailure(format!("negative count {value} in {operation}"))
    })
}
