//! Shared SQLite pool setup.
//!
//! Both SQLite-backed stores run off one pool; [`connect`] opens (or creates)
//! the database and, when the `sqlite-migrations` feature is enabled
//! (default), applies the embedded migrations. Disabling the feature assumes
//! external migration orchestration.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use miette::Diagnostic;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DbError {
    #[error("database connect error: {0}")]
    #[diagnostic(
        code(coldflow::db::connect),
        help("Ensure DATABASE_URL is a valid, accessible SQLite URL.")
    )]
    Connect(#[source] sqlx::Error),

    #[error("migration failure: {0}")]
    #[diagnostic(code(coldflow::db::migrate))]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

/// Open (or create) the SQLite database at `database_url` and migrate it.
///
/// Example URL: `"sqlite://coldflow.db"`.
pub async fn connect(database_url: &str) -> Result<SqlitePool, DbError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(DbError::Connect)?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .map_err(DbError::Connect)?;

    #[cfg(feature = "sqlite-migrations")]
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(DbError::Migrate)?;

    Ok(pool)
}

/// Fixed-width RFC 3339 UTC rendering.
///
/// Millisecond precision with a `Z` suffix keeps every timestamp the same
/// shape, so `fire_at <= ?` comparisons on TEXT columns are order-correct.
#[must_use]
pub fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted RFC 3339 timestamp, falling back to now on corruption.
#[must_use]
pub fn decode_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_timestamps_order_textually() {
        let early = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(encode_ts(early) < encode_ts(late));
        assert_eq!(decode_ts(&encode_ts(early)), early);
    }
}
