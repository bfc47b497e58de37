use anyhow::Context;
use chrono::{Datelike, NaiveDate};

// Advisory locks belong to the Postgres session, so acquire and release must go through the same
// connection. Guards against two screener processes evaluating the same date at once.
const LOCK_NAMESPACE: i64 = 0x5354_4B57_495A; // "STKWIZ"

pub fn lock_key_for_date(as_of_date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ i64::from(as_of_date.num_days_from_ce())
}

pub async fn try_acquire_date_lock(
    conn: &mut sqlx::PgConnection,
    as_of_date: NaiveDate,
) -> anyhow::Result<bool> {
    let key = lock_key_for_date(as_of_date);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire screener lock for {as_of_date} (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_date_lock(
    conn: &mut sqlx::PgConnection,
    as_of_date: NaiveDate,
) -> anyhow::Result<()> {
    let key = lock_key_for_date(as_of_date);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to release screener lock for {as_of_date} (key={key})"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differ_per_date() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_ne!(lock_key_for_date(a), lock_key_for_date(b));
        assert_eq!(lock_key_for_date(a), lock_key_for_date(a));
    }
}
