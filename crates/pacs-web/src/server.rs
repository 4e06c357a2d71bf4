//! Web服务器

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use pacs_core::Result;
use pacs_workflow::PrintWorkflow;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{
    add_printer, create_print_job, delete_print_job, get_print_job, health, list_print_jobs, list_printers,
    print_by_job, print_job_stats, remove_printer, set_default_printer, AppState,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, workflow: Arc<PrintWorkflow>) -> Self {
        Self {
            addr,
            app: create_app(workflow),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// 构建完整路由
pub fn create_app(workflow: AppState) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/health", get(health))
        .nest("/api/print", print_job_routes())
        .nest("/api/PrintScu", print_scu_routes())
        .with_state(workflow)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

/// 打印任务路由
fn print_job_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_print_jobs).post(create_print_job))
        .route("/stats", get(print_job_stats))
        .route("/:job_id", get(get_print_job).delete(delete_print_job))
}

/// 打印派发与打印机路由
fn print_scu_routes() -> Router<AppState> {
    Router::new()
        .route("/print-by-job", post(print_by_job))
        .route("/printers", get(list_printers).post(add_printer))
        .route("/printers/:name", delete(remove_printer))
        .route("/printers/:name/default", put(set_default_printer))
}

async fn api_root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "PACS Print API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "printJobs": "/api/print",
            "printJobStats": "/api/print/stats",
            "printByJob": "/api/PrintScu/print-by-job",
            "printers": "/api/PrintScu/printers",
            "health": "/health"
        }
    }))
}
