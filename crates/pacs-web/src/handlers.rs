//! HTTP处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use pacs_core::{JobId, PacsError, PrintJob, PrintJobRequest, PrintJobStatus, Printer};
use pacs_workflow::{Page, PrintJobFilter, PrintWorkflow, StatusCounts};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 处理器共享状态
pub type AppState = Arc<PrintWorkflow>;

/// HTTP层错误包装
#[derive(Debug)]
pub struct ApiError(pub PacsError);

impl From<PacsError> for ApiError {
    fn from(err: PacsError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            PacsError::Validation(_) | PacsError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PacsError::NotFound(_) => StatusCode::NOT_FOUND,
            PacsError::InvalidStateTransition { .. } | PacsError::Conflict(_) => StatusCode::CONFLICT,
            PacsError::Network(_)
            | PacsError::Serialization(_)
            | PacsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 错误处理
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let mut body = json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        });
        if let PacsError::Validation(violations) = &self.0 {
            body["fields"] = json!(violations
                .iter()
                .map(|v| json!({ "field": v.field, "reason": v.reason }))
                .collect::<Vec<_>>());
        }

        (status, Json(body)).into_response()
    }
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 打印任务查询参数，空白值视为未提供
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobQueryParams {
    #[serde(rename = "callingAE")]
    pub calling_ae: Option<String>,
    #[serde(rename = "studyUID")]
    pub study_uid: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_number(name: &str, value: Option<String>, default: usize) -> pacs_core::Result<usize> {
    match non_blank(value) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| PacsError::InvalidArgument(format!("{} must be a non-negative integer, got '{}'", name, raw))),
    }
}

impl PrintJobQueryParams {
    pub fn filter(&self) -> pacs_core::Result<PrintJobFilter> {
        let status = non_blank(self.status.clone())
            .map(|raw| raw.parse::<PrintJobStatus>())
            .transpose()?;
        let date_on_or_after = non_blank(self.date.clone())
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| PacsError::InvalidArgument(format!("date must be YYYY-MM-DD, got '{}'", raw)))
            })
            .transpose()?;

        Ok(PrintJobFilter {
            calling_ae: non_blank(self.calling_ae.clone()),
            study_uid: non_blank(self.study_uid.clone()),
            status,
            date_on_or_after,
        })
    }

    pub fn paging(&self, default_page_size: usize) -> pacs_core::Result<(usize, usize)> {
        Ok((
            parse_number("page", self.page.clone(), 1)?,
            parse_number("pageSize", self.page_size.clone(), default_page_size)?,
        ))
    }
}

/// 打印任务列表
pub async fn list_print_jobs(
    State(workflow): State<AppState>,
    Query(params): Query<PrintJobQueryParams>,
) -> ApiResult<Json<Page<PrintJob>>> {
    let filter = params.filter()?;
    let (page, page_size) = params.paging(workflow.default_page_size())?;
    let result = workflow.list_print_jobs(&filter, page, page_size).await?;
    Ok(Json(result))
}

/// 打印任务状态统计
pub async fn print_job_stats(
    State(workflow): State<AppState>,
    Query(params): Query<PrintJobQueryParams>,
) -> ApiResult<Json<StatusCounts>> {
    let filter = params.filter()?;
    Ok(Json(workflow.print_job_stats(&filter).await))
}

/// 创建打印任务
pub async fn create_print_job(
    State(workflow): State<AppState>,
    Json(request): Json<PrintJobRequest>,
) -> ApiResult<(StatusCode, Json<PrintJob>)> {
    let job = workflow.create_print_job(request).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_print_job(State(workflow): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<PrintJob>> {
    let job_id: JobId = job_id.parse()?;
    Ok(Json(workflow.get_print_job(job_id).await?))
}

pub async fn delete_print_job(State(workflow): State<AppState>, Path(job_id): Path<String>) -> ApiResult<StatusCode> {
    let job_id: JobId = job_id.parse()?;
    workflow.delete_print_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 按任务打印请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintByJobRequest {
    pub job_id: String,
    #[serde(default)]
    pub printer_name: Option<String>,
}

/// 派发受理回执
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintAccepted {
    pub job_id: JobId,
    pub printer_name: String,
    pub accepted: bool,
}

/// 派发打印任务，结果异步回写到任务状态
pub async fn print_by_job(
    State(workflow): State<AppState>,
    Json(request): Json<PrintByJobRequest>,
) -> ApiResult<(StatusCode, Json<PrintAccepted>)> {
    let job_id: JobId = request.job_id.parse()?;
    let ticket = workflow
        .dispatch_print_job(job_id, request.printer_name.as_deref())
        .await?;

    let accepted = PrintAccepted {
        job_id: ticket.job_id(),
        printer_name: ticket.printer_name().to_string(),
        accepted: true,
    };

    tokio::spawn(async move {
        match ticket.outcome().await {
            Ok(report) => info!(
                "Print job {} on {} finished as {:?}",
                report.job_id, report.printer_name, report.status
            ),
            Err(e) => warn!("Print job {} finished without a report: {}", job_id, e),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// 打印机列表
pub async fn list_printers(State(workflow): State<AppState>) -> Json<Vec<Printer>> {
    Json(workflow.list_printers().await)
}

pub async fn add_printer(
    State(workflow): State<AppState>,
    Json(printer): Json<Printer>,
) -> ApiResult<(StatusCode, Json<Printer>)> {
    let printer = workflow.add_printer(printer).await?;
    Ok((StatusCode::CREATED, Json(printer)))
}

pub async fn remove_printer(State(workflow): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    workflow.remove_printer(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default_printer(State(workflow): State<AppState>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    workflow.set_default_printer(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
