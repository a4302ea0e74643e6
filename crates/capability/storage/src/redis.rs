//! Redis 实时视图实现
//!
//! 每个点位一个 key：`plc:{plc_name}:tag:{tag_name}:realtime`，值为 JSON。
//! 条件覆盖由 Lua 脚本在服务端原子完成，避免读-比较-写之间的竞争。

use crate::error::StorageError;
use crate::models::{RealtimeRecord, latest_per_key};
use crate::traits::RealtimeStore;
use domain::{Reading, TagValue, now_epoch_ms};
use redis::AsyncCommands;

/// 仅当已存 ts_ms 不大于新值时写入，返回 1 表示写入。
const CONDITIONAL_SET: &str = r#"
local current = redis.call('GET', KEYS[1])
if current then
  local decoded = cjson.decode(current)
  if tonumber(decoded['ts_ms']) > tonumber(ARGV[2]) then
    return 0
  end
end
if tonumber(ARGV[3]) > 0 then
  redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
else
  redis.call('SET', KEYS[1], ARGV[1])
end
return 1
"#;

#[derive(serde::Serialize, serde::Deserialize)]
struct RealtimePayload {
    plc_name: String,
    tag_name: String,
    ts_ms: i64,
    updated_at_ms: i64,
    value: TagValue,
}

impl From<RealtimePayload> for RealtimeRecord {
    fn from(payload: RealtimePayload) -> Self {
        Self {
            plc_name: payload.plc_name,
            tag_name: payload.tag_name,
            value: payload.value,
            ts_ms: payload.ts_ms,
            updated_at_ms: payload.updated_at_ms,
        }
    }
}

fn realtime_key(plc_name: &str, tag_name: &str) -> String {
    format!("plc:{}:tag:{}:realtime", plc_name, tag_name)
}

/// Redis 实时视图存储
pub struct RedisRealtimeStore {
    client: redis::Client,
    ttl_seconds: Option<u64>,
    script: redis::Script,
}

impl RedisRealtimeStore {
    pub fn new(client: redis::Client) -> Self {
        Self::new_with_ttl(client, None)
    }

    pub fn new_with_ttl(client: redis::Client, ttl_seconds: Option<u64>) -> Self {
        Self {
            client,
            ttl_seconds: ttl_seconds.filter(|ttl| *ttl > 0),
            script: redis::Script::new(CONDITIONAL_SET),
        }
    }

    pub fn connect(redis_url: &str) -> Result<Self, StorageError> {
        Self::connect_with_ttl(redis_url, None)
    }

    pub fn connect_with_ttl(
        redis_url: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new_with_ttl(client, ttl_seconds))
    }
}

#[async_trait::async_trait]
impl RealtimeStore for RedisRealtimeStore {
    async fn upsert_realtime(&self, readings: &[Reading]) -> Result<usize, StorageError> {
        let latest = latest_per_key(readings);
        if latest.is_empty() {
            return Ok(0);
        }
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let updated_at_ms = now_epoch_ms();
        let ttl = self.ttl_seconds.unwrap_or(0);
        let mut written = 0;
        for reading in latest {
            let Some(value) = reading.value.clone() else {
                continue;
            };
            let payload = RealtimePayload {
                plc_name: reading.plc_name.clone(),
                tag_name: reading.tag_name.clone(),
                ts_ms: reading.ts_ms,
                updated_at_ms,
                value,
            };
            let data = serde_json::to_string(&payload)?;
            let applied: i64 = self
                .script
                .key(realtime_key(&reading.plc_name, &reading.tag_name))
                .arg(data)
                .arg(reading.ts_ms)
                .arg(ttl)
                .invoke_async(&mut connection)
                .await?;
            written += applied as usize;
        }
        Ok(written)
    }

    async fn get_realtime(
        &self,
        plc_name: &str,
        tag_name: &str,
    ) -> Result<Option<RealtimeRecord>, StorageError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let data: Option<String> = connection.get(realtime_key(plc_name, tag_name)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let payload: RealtimePayload = serde_json::from_str(&data)?;
        Ok(Some(payload.into()))
    }

    async fn list_realtime(&self, plc_name: &str) -> Result<Vec<RealtimeRecord>, StorageError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let pattern = format!("plc:{}:tag:*:realtime", plc_name);
        let mut cursor: u64 = 0;
        let mut items = Vec::new();
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut connection)
                .await?;
            for key in keys {
                let data: Option<String> = connection.get(&key).await?;
                let Some(data) = data else {
                    continue;
                };
                let payload: RealtimePayload = serde_json::from_str(&data)?;
                // MATCH 是 glob，名字里带通配符时需要再按字段过滤
                if payload.plc_name != plc_name {
                    continue;
                }
                items.push(payload.into());
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        items.sort_by(|a: &RealtimeRecord, b: &RealtimeRecord| a.tag_name.cmp(&b.tag_name));
        Ok(items)
    }
}
