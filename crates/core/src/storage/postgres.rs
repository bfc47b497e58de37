use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::{
    Listing, Market, PriceBar, QuarterlyReport, RelativeStrengthRecord, UniverseFilter,
    WatchlistReport,
};
use crate::error::StoreError;
use crate::storage::{RsQuery, RunRecord, ScreenerStore, Table};

const RS_INSERT_BATCH: usize = 500;

#[derive(Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

fn percentile(table: Table, v: i16) -> Result<u8, StoreError> {
    u8::try_from(v)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| StoreError::Decode {
            table: table.name(),
            detail: format!("percentile out of range: {v}"),
        })
}

fn rs_from_row(row: &PgRow) -> Result<RelativeStrengthRecord, StoreError> {
    let table = Table::RelativeStrength;
    let opt = |col: &str| -> Result<Option<u8>, StoreError> {
        row.try_get::<Option<i16>, _>(col)?
            .map(|v| percentile(table, v))
            .transpose()
    };
    Ok(RelativeStrengthRecord {
        ticker: row.try_get("ticker")?,
        date: row.try_get("date")?,
        rscore: percentile(table, row.try_get("rscore")?)?,
        m1: opt("m1")?,
        m3: opt("m3")?,
        m6: opt("m6")?,
    })
}

fn report_from_row(row: &PgRow) -> Result<WatchlistReport, StoreError> {
    let data: serde_json::Value = row.try_get("data")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(WatchlistReport {
        date: row.try_get("date")?,
        kind: row.try_get("kind")?,
        tickers: WatchlistReport::tickers_from_payload(&data),
        created_at,
    })
}

#[async_trait::async_trait]
impl ScreenerStore for PgStore {
    async fn read_price_history(
        &self,
        ticker: &str,
        as_of: Option<NaiveDate>,
        max_bars: Option<usize>,
    ) -> Result<Vec<PriceBar>, StoreError> {
        // LIMIT NULL is no limit.
        let sql = format!(
            "SELECT * FROM ( \
                SELECT ticker, date, open, high, low, close, adj_close, volume FROM {} \
                WHERE ticker = $1 AND ($2::date IS NULL OR date <= $2) \
                ORDER BY date DESC LIMIT $3 \
             ) recent ORDER BY date ASC",
            Table::DailyKline.name()
        );
        let limit = max_bars.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = sqlx::query(&sql)
            .persistent(false)
            .bind(ticker)
            .bind(as_of)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<PriceBar, StoreError> {
                Ok(PriceBar {
                    ticker: row.try_get("ticker")?,
                    date: row.try_get("date")?,
                    open: row.try_get("open")?,
                    high: row.try_get("high")?,
                    low: row.try_get("low")?,
                    close: row.try_get("close")?,
                    adj_close: row.try_get("adj_close")?,
                    volume: row.try_get("volume")?,
                })
            })
            .collect()
    }

    async fn read_fundamentals(&self, ticker: &str) -> Result<Vec<QuarterlyReport>, StoreError> {
        let sql = format!(
            "SELECT ticker, report_date, sales, net_income, gross_margin_ratio FROM {} \
             WHERE ticker = $1 AND report_type = 'QUARTERLY' \
             ORDER BY report_date ASC",
            Table::Fundamentals.name()
        );
        let rows = sqlx::query(&sql)
            .persistent(false)
            .bind(ticker)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<QuarterlyReport, StoreError> {
                Ok(QuarterlyReport {
                    ticker: row.try_get("ticker")?,
                    report_date: row.try_get("report_date")?,
                    sales: row.try_get("sales")?,
                    net_income: row.try_get("net_income")?,
                    gross_margin_ratio: row.try_get("gross_margin_ratio")?,
                })
            })
            .collect()
    }

    async fn read_universe(&self, filter: &UniverseFilter) -> Result<Vec<Listing>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT ON (ticker) ticker, market FROM {} \
             WHERE ($1 = FALSE OR delisted = FALSE) AND ticker NOT LIKE '^%' \
             ORDER BY ticker ASC",
            Table::Tickers.name()
        );
        let rows = sqlx::query(&sql)
            .persistent(false)
            .bind(filter.exclude_delisted)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let market: String = row.try_get("market")?;
            let market: Market = market.parse().unwrap_or(Market::Other);
            if !filter.admits(market) {
                continue;
            }
            out.push(Listing {
                ticker: row.try_get::<String, _>("ticker")?.trim().to_string(),
                market,
            });
        }
        Ok(out)
    }

    async fn read_trading_calendar(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let sql = format!(
            "SELECT date FROM {} ORDER BY date ASC",
            Table::TradingCalendar.name()
        );
        let dates: Vec<NaiveDate> = sqlx::query_scalar(&sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;
        Ok(dates)
    }

    async fn write_relative_strength(
        &self,
        records: &[RelativeStrengthRecord],
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected: u64 = 0;

        for (batch_idx, chunk) in records.chunks(RS_INSERT_BATCH).enumerate() {
            let t0 = std::time::Instant::now();
            let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
                "INSERT INTO {} (ticker, date, rscore, m1, m3, m6) ",
                Table::RelativeStrength.name()
            ));
            qb.push_values(chunk, |mut b, rec| {
                b.push_bind(rec.ticker.as_str())
                    .push_bind(rec.date)
                    .push_bind(i16::from(rec.rscore))
                    .push_bind(rec.m1.map(i16::from))
                    .push_bind(rec.m3.map(i16::from))
                    .push_bind(rec.m6.map(i16::from));
            });
            qb.push(" ON CONFLICT (ticker, date) DO NOTHING");

            let res = qb.build().persistent(false).execute(&mut *tx).await?;
            affected += res.rows_affected();

            tracing::debug!(
                batch_idx,
                batch_size = chunk.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "relative_strength batch insert"
            );
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn read_relative_strength(
        &self,
        query: &RsQuery,
    ) -> Result<Vec<RelativeStrengthRecord>, StoreError> {
        let table = Table::RelativeStrength.name();
        let rows = match query {
            RsQuery::Ticker(ticker) => {
                let sql = format!(
                    "SELECT ticker, date, rscore, m1, m3, m6 FROM {table} \
                     WHERE ticker = $1 ORDER BY date ASC"
                );
                sqlx::query(&sql)
                    .persistent(false)
                    .bind(ticker)
                    .fetch_all(&self.pool)
                    .await?
            }
            RsQuery::Date(date) => {
                let sql = format!(
                    "SELECT ticker, date, rscore, m1, m3, m6 FROM {table} \
                     WHERE date = $1 ORDER BY ticker ASC"
                );
                sqlx::query(&sql)
                    .persistent(false)
                    .bind(date)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(rs_from_row).collect()
    }

    async fn rs_dates(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT date FROM {} ORDER BY date ASC",
            Table::RelativeStrength.name()
        );
        let dates: Vec<NaiveDate> = sqlx::query_scalar(&sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;
        Ok(dates)
    }

    async fn write_reports(&self, reports: &[WatchlistReport]) -> Result<(), StoreError> {
        if reports.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
            "INSERT INTO {} (date, kind, data, created_at) ",
            Table::Report.name()
        ));
        qb.push_values(reports, |mut b, report| {
            b.push_bind(report.date)
                .push_bind(report.kind.as_str())
                .push_bind(report.payload())
                .push_bind(report.created_at);
        });
        let res = qb.build().persistent(false).execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!(rows = res.rows_affected(), "report batch insert");
        Ok(())
    }

    async fn latest_report(
        &self,
        kind: &str,
        before: Option<NaiveDate>,
    ) -> Result<Option<WatchlistReport>, StoreError> {
        let sql = format!(
            "SELECT date, kind, data, created_at FROM {} \
             WHERE kind = $1 AND ($2::date IS NULL OR date < $2) \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            Table::Report.name()
        );
        let row = sqlx::query(&sql)
            .persistent(false)
            .bind(kind)
            .bind(before)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn write_breadth(&self, date: NaiveDate, value: f64) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (date, value) VALUES ($1, $2) \
             ON CONFLICT (date) DO UPDATE SET value = EXCLUDED.value, created_at = now()",
            Table::Breadth.name()
        );
        sqlx::query(&sql)
            .persistent(false)
            .bind(date)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, as_of_date, generated_at, status, error, summary) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            Table::ScreenRuns.name()
        );
        sqlx::query(&sql)
            .persistent(false)
            .bind(run.id)
            .bind(run.as_of_date)
            .bind(Utc::now())
            .bind(run.status)
            .bind(run.error.as_deref())
            .bind(&run.summary)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
