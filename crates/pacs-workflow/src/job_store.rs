//! 打印任务存储
//!
//! 任务状态只能通过 [`PrintJobStore::transition`] 修改。每个变更都在一次写锁内完成，
//! 并发转换同一任务时只有一个调用能离开给定状态。

use crate::query::{count_statuses, query_jobs, Page, PrintJobFilter, StatusCounts};
use crate::state_machine::PrintJobStateMachine;
use chrono::Utc;
use pacs_core::utils::next_update_time;
use pacs_core::{JobId, PacsError, PrintJob, PrintJobRequest, PrintJobStatus, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 未提供失败原因时写入的错误信息
pub const DEFAULT_FAILURE_MESSAGE: &str = "print job failed without detail";

/// 状态转换附带的信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionDetail {
    pub error_message: Option<String>,
    pub image_path: Option<String>,
}

impl TransitionDetail {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            image_path: None,
        }
    }

    pub fn image(image_path: Option<String>) -> Self {
        Self {
            error_message: None,
            image_path,
        }
    }
}

/// 打印任务存储
#[derive(Debug, Default)]
pub struct PrintJobStore {
    jobs: RwLock<HashMap<JobId, PrintJob>>,
    state_machine: PrintJobStateMachine,
}

impl PrintJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 校验请求并创建 `Created` 状态的任务
    pub async fn create(&self, request: &PrintJobRequest) -> Result<PrintJob> {
        let validated = request.validate()?;
        let now = Utc::now();

        let job = PrintJob {
            job_id: JobId::new(),
            calling_ae: validated.calling_ae,
            study_instance_uid: validated.study_instance_uid,
            film_session: validated.film_session,
            film_box: validated.film_box,
            status: PrintJobStatus::Created,
            error_message: None,
            image_path: None,
            printer_name: None,
            create_time: now,
            update_time: now,
        };

        self.jobs.write().await.insert(job.job_id, job.clone());

        tracing::info!(
            "Created print job {} for study {} from {}",
            job.job_id,
            job.study_instance_uid.as_deref().unwrap_or("<none>"),
            job.calling_ae
        );
        Ok(job)
    }

    pub async fn get(&self, job_id: JobId) -> Result<PrintJob> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or_else(|| not_found(job_id))
    }

    /// 状态转换
    pub async fn transition(&self, job_id: JobId, target: PrintJobStatus, detail: TransitionDetail) -> Result<PrintJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or_else(|| not_found(job_id))?;
        let from = job.status;
        if let Err(e) = self.state_machine.validate(from, target) {
            tracing::debug!(
                "Rejected transition of print job {} from {} to {}, allowed: {:?}",
                job_id,
                from,
                target,
                self.state_machine.next_states(from)
            );
            return Err(e);
        }

        job.status = target;
        job.update_time = next_update_time(job.update_time);
        match target {
            PrintJobStatus::Failed => {
                // 传输给出的描述原样保留，只有缺失时才使用默认文本
                job.error_message = Some(
                    detail
                        .error_message
                        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
                );
            }
            PrintJobStatus::ImageReceived => {
                if detail.image_path.is_some() {
                    job.image_path = detail.image_path;
                }
            }
            PrintJobStatus::Created | PrintJobStatus::Completed => {}
        }

        match target {
            PrintJobStatus::Failed => tracing::warn!(
                "Print job {} moved from {} to Failed: {}",
                job_id,
                from,
                job.error_message.as_deref().unwrap_or_default()
            ),
            _ => tracing::info!("Print job {} moved from {} to {}", job_id, from, target),
        }
        Ok(job.clone())
    }

    /// 删除任务，不限状态
    pub async fn delete(&self, job_id: JobId) -> Result<PrintJob> {
        let removed = self
            .jobs
            .write()
            .await
            .remove(&job_id)
            .ok_or_else(|| not_found(job_id))?;
        tracing::info!("Deleted print job {} in state {}", job_id, removed.status);
        Ok(removed)
    }

    /// 记录任务被派发到的打印机，不改变状态与时间戳
    pub async fn record_printer(&self, job_id: JobId, printer_name: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or_else(|| not_found(job_id))?;
        job.printer_name = Some(printer_name.to_string());
        Ok(())
    }

    pub async fn list(&self, filter: &PrintJobFilter, page: usize, page_size: usize) -> Result<Page<PrintJob>> {
        let jobs = self.jobs.read().await;
        query_jobs(jobs.values(), filter, page, page_size)
    }

    pub async fn status_counts(&self, filter: &PrintJobFilter) -> StatusCounts {
        let jobs = self.jobs.read().await;
        count_statuses(jobs.values(), filter)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn not_found(job_id: JobId) -> PacsError {
    PacsError::NotFound(format!("print job {}", job_id))
}
