//! 采集链路装配模块
//!
//! 按运行配置选择存储实现、注册设备驱动，并组装样本汇与 Supervisor：
//!
//! ```text
//! Supervisor ─► Poller × N ─► SampleSink ─► HistoricalStore / RealtimeStore
//! ```
//!
//! 存储选择：
//! - 历史视图：配置了 `COLLECTOR_DATABASE_URL` 时写 Postgres，否则写内存
//! - 实时视图：优先 Redis，其次 Postgres，最后内存

use domain::ControllerFamily;
use plc_config::AppConfig;
use plc_ingest::{PollerSettings, Supervisor};
use plc_pipeline::{SampleSink, SinkConfig, SinkHandle};
use plc_protocol::{DriverRegistry, ModbusTcpDriver, SessionTimeouts, SimulatedDriver};
use plc_storage::{
    HistoricalStore, InMemoryHistoricalStore, InMemoryRealtimeStore, PgHistoricalStore,
    PgRealtimeStore, RealtimeStore, RedisRealtimeStore, StorageError, connect_pool,
    ensure_schema,
};
use plc_telemetry::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 两个存储视图。
#[derive(Clone)]
pub struct Stores {
    pub historical: Arc<dyn HistoricalStore>,
    pub realtime: Arc<dyn RealtimeStore>,
}

/// 装配完成的采集链路。
pub struct Collector {
    pub supervisor: Arc<Supervisor>,
    pub sink: SampleSink,
    pub sink_handle: SinkHandle,
    pub realtime: Arc<dyn RealtimeStore>,
}

/// 按配置连接存储；Postgres 会先建表。
pub async fn build_stores(config: &AppConfig) -> Result<Stores, StorageError> {
    let pool = match &config.database_url {
        Some(url) => {
            let pool = connect_pool(url).await?;
            ensure_schema(&pool).await?;
            info!(target: "plc.collector", "postgres storage ready");
            Some(pool)
        }
        None => None,
    };

    let historical: Arc<dyn HistoricalStore> = match &pool {
        Some(pool) => Arc::new(PgHistoricalStore::new(pool.clone())),
        None => {
            warn!(target: "plc.collector", "COLLECTOR_DATABASE_URL not set, historical view kept in memory");
            Arc::new(InMemoryHistoricalStore::new())
        }
    };

    let realtime: Arc<dyn RealtimeStore> = if let Some(url) = &config.redis_url {
        info!(
            target: "plc.collector",
            ttl_seconds = ?config.redis_realtime_ttl_seconds,
            "realtime view on redis"
        );
        Arc::new(RedisRealtimeStore::connect_with_ttl(
            url,
            config.redis_realtime_ttl_seconds,
        )?)
    } else if let Some(pool) = &pool {
        Arc::new(PgRealtimeStore::new(pool.clone()))
    } else {
        Arc::new(InMemoryRealtimeStore::new())
    };

    Ok(Stores {
        historical,
        realtime,
    })
}

/// 当前可用的驱动：Modbus TCP 与仿真控制器。
///
/// Logix 系列没有注册驱动，配置中出现时启动会被拒绝。
pub fn build_registry() -> DriverRegistry {
    DriverRegistry::new()
        .with(
            ControllerFamily::ModbusTcp,
            Arc::new(ModbusTcpDriver::default()),
        )
        .with(
            ControllerFamily::Simulated,
            Arc::new(SimulatedDriver::generating()),
        )
}

pub fn sink_config(config: &AppConfig) -> SinkConfig {
    SinkConfig {
        capacity: config.sink_capacity,
        batch_size: config.sink_batch_size,
        max_wait: Duration::from_millis(config.sink_max_wait_ms),
        submit_timeout: Duration::from_millis(config.sink_submit_timeout_ms),
        max_retries: config.sink_max_retries,
        retry_delay: Duration::from_millis(config.sink_retry_delay_ms),
    }
}

pub fn poller_settings(config: &AppConfig) -> PollerSettings {
    PollerSettings {
        timeouts: SessionTimeouts {
            connect: Duration::from_millis(config.connect_timeout_ms),
            read: Duration::from_millis(config.read_timeout_ms),
            health_check: Duration::from_millis(config.health_check_timeout_ms),
        },
        backoff_base: Duration::from_millis(config.backoff_base_ms),
        backoff_cap: Duration::from_millis(config.backoff_cap_ms),
        backoff_jitter: config.backoff_jitter,
        health_check_interval: Duration::from_millis(config.health_check_interval_ms),
        min_tick: Duration::from_millis(config.min_tick_ms),
    }
}

/// 启动样本汇写入任务并创建 Supervisor（尚未启动任何 Poller）。
pub fn assemble(
    stores: Stores,
    registry: DriverRegistry,
    sink_config: SinkConfig,
    settings: PollerSettings,
) -> Collector {
    let events = EventBus::default();
    let (sink, sink_handle) = SampleSink::spawn(
        stores.historical,
        stores.realtime.clone(),
        sink_config,
        events.clone(),
    );
    let supervisor = Arc::new(Supervisor::new(registry, sink.clone(), events, settings));
    Collector {
        supervisor,
        sink,
        sink_handle,
        realtime: stores.realtime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_modbus_and_simulated_only() {
        let registry = build_registry();
        assert!(registry.supports(ControllerFamily::ModbusTcp));
        assert!(registry.supports(ControllerFamily::Simulated));
        assert!(!registry.supports(ControllerFamily::ControlLogix));
    }
}
