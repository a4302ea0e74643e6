//! 数据库连接管理
//!
//! 提供数据库连接池初始化功能：
//! - connect_pool：建立 Postgres 连接池
//! - ensure_schema：创建历史表与实时表（幂等）
//!
//! 设计原则：
//! - 最大连接数限制为 8
//! - 建表语句使用 `if not exists`，可在每次启动时执行

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const SCHEMA_STATEMENTS: &[&str] = &[
    "create table if not exists plc_historical (\
        id bigserial primary key, \
        plc_name text not null, \
        tag_name text not null, \
        ts_ms bigint not null, \
        value_json text, \
        success boolean not null, \
        error text, \
        inserted_at timestamptz not null default now())",
    "create index if not exists idx_plc_historical_key_ts \
        on plc_historical (plc_name, tag_name, ts_ms)",
    "create table if not exists plc_realtime (\
        plc_name text not null, \
        tag_name text not null, \
        value_json text not null, \
        ts_ms bigint not null, \
        updated_at_ms bigint not null, \
        primary key (plc_name, tag_name))",
];

/// 建立 Postgres 连接池
///
/// 从数据库 URL 创建连接池，最大连接数限制为 8。
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// 创建采集所需的表和索引
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
