//! PLC 采集服务：按 PLC 定义文件轮询控制器，写入历史 / 实时视图，
//! 并提供状态、指标和实时值查询接口。

mod collector;
mod handlers;
mod routes;
mod utils;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use plc_config::{AppConfig, load_plc_configs};
use plc_ingest::Supervisor;
use plc_pipeline::SampleSink;
use plc_storage::RealtimeStore;
use plc_telemetry::{init_tracing, new_request_ids};
use std::sync::Arc;
use tracing::{Instrument, info};

#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub sink: SampleSink,
    pub realtime: Arc<dyn RealtimeStore>,
    /// reload 时重新读取的 PLC 定义文件
    pub plc_config_path: Arc<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // PLC 定义在连接任何存储之前校验读取
    let plcs = load_plc_configs(&config.plc_config_path)?;

    let stores = collector::build_stores(&config).await?;
    let collector = collector::assemble(
        stores,
        collector::build_registry(),
        collector::sink_config(&config),
        collector::poller_settings(&config),
    );
    collector.supervisor.start(plcs).await?;

    let state = AppState {
        supervisor: collector.supervisor.clone(),
        sink: collector.sink.clone(),
        realtime: collector.realtime.clone(),
        plc_config_path: Arc::new(config.plc_config_path.clone()),
    };
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "plc.collector", addr = %config.http_addr, "http listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 先停 Poller，再让样本汇写完排队的读数
    collector.supervisor.stop_all().await;
    collector.sink_handle.shutdown().await;
    info!(target: "plc.collector", "collector stopped");
    Ok(())
}

/// 路由同时挂在 / 和 /api/ 下。
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_api_router())
        .nest("/api", routes::create_api_router())
        .with_state(state)
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "plc.collector", error = %err, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    info!(target: "plc.collector", "shutdown requested");
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
