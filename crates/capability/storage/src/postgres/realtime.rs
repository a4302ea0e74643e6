//! Postgres 实时视图写入实现
//!
//! 以 `(plc_name, tag_name)` 为主键做条件 upsert：
//! 只有新读数时间戳不小于已存时间戳时才覆盖，乱序到达的旧值不会回退实时视图。

use crate::error::StorageError;
use crate::models::{RealtimeRecord, latest_per_key};
use crate::traits::RealtimeStore;
use domain::{Reading, TagValue, now_epoch_ms};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgRealtimeStore {
    pub pool: PgPool,
}

impl PgRealtimeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn record_from_row(row: &PgRow) -> Result<RealtimeRecord, StorageError> {
    let value_json: String = row.try_get("value_json")?;
    Ok(RealtimeRecord {
        plc_name: row.try_get("plc_name")?,
        tag_name: row.try_get("tag_name")?,
        value: TagValue::from_json(&value_json)?,
        ts_ms: row.try_get("ts_ms")?,
        updated_at_ms: row.try_get("updated_at_ms")?,
    })
}

#[async_trait::async_trait]
impl RealtimeStore for PgRealtimeStore {
    async fn upsert_realtime(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let latest = latest_per_key(readings);
        if latest.is_empty() {
            return Ok(0);
        }
        let updated_at_ms = now_epoch_ms();
        let mut written = 0;
        let mut tx = self.pool.begin().await?;
        for reading in latest {
            let Some(value) = &reading.value else {
                continue;
            };
            let result = sqlx::query(
                "insert into plc_realtime (plc_name, tag_name, value_json, ts_ms, updated_at_ms) \
                 values ($1, $2, $3, $4, $5) \
                 on conflict (plc_name, tag_name) do update set \
                 value_json = excluded.value_json, \
                 ts_ms = excluded.ts_ms, \
                 updated_at_ms = excluded.updated_at_ms \
                 where plc_realtime.ts_ms <= excluded.ts_ms",
            )
            .bind(&reading.plc_name)
            .bind(&reading.tag_name)
            .bind(value.to_json()?)
            .bind(reading.ts_ms)
            .bind(updated_at_ms)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn get_realtime(
        &self,
        plc_name: &str,
        tag_name: &str,
    ) -> Result<Option<RealtimeRecord>, StorageError> {
        let row = sqlx::query(
            "select plc_name, tag_name, value_json, ts_ms, updated_at_ms \
             from plc_realtime where plc_name = $1 and tag_name = $2",
        )
        .bind(plc_name)
        .bind(tag_name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_realtime(&self, plc_name: &str) -> Result<Vec<RealtimeRecord>, StorageError> {
        let rows = sqlx::query(
            "select plc_name, tag_name, value_json, ts_ms, updated_at_ms \
             from plc_realtime where plc_name = $1 order by tag_name",
        )
        .bind(plc_name)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }
}
