//! Postgres 历史视图写入实现

use crate::error::StorageError;
use crate::traits::HistoricalStore;
use domain::Reading;
use sqlx::{PgPool, Row};

pub struct PgHistoricalStore {
    pub pool: PgPool,
}

impl PgHistoricalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl HistoricalStore for PgHistoricalStore {
    async fn append_historical(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        if readings.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        for reading in readings {
            let value_json = match &reading.value {
                Some(value) => Some(value.to_json()?),
                None => None,
            };
            sqlx::query(
                "insert into plc_historical (plc_name, tag_name, ts_ms, value_json, success, error) \
                 values ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&reading.plc_name)
            .bind(&reading.tag_name)
            .bind(reading.ts_ms)
            .bind(value_json)
            .bind(reading.success)
            .bind(&reading.error)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(readings.len())
    }

    async fn count_historical(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("select count(*) as total from plc_historical")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }
}
