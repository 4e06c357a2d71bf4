//! 打印派发
//!
//! 派发请求进入有界队列，由固定数量的 tokio 工作任务执行。队列满时提交方等待。
//! 每个派发通过 oneshot 通道返回结果，传输失败只会体现为任务状态，不会作为错误抛出。

use crate::job_store::{PrintJobStore, TransitionDetail};
use crate::printers::PrinterDirectory;
use pacs_archive::ArchiveIndex;
use pacs_core::{JobId, PacsError, PrintJob, PrintJobStatus, PrinterTarget, Result};
use pacs_dicom::{ImageSource, PrintTransport, TransportOutcome, TransportStatus};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 派发配置
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub transport_timeout: Duration,
    /// 本端作为打印SCU时使用的AE Title
    pub calling_ae_title: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
            transport_timeout: Duration::from_secs(30),
            calling_ae_title: "PACS_PRINT".to_string(),
        }
    }
}

/// 一次派发的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub job_id: JobId,
    pub printer_name: String,
    /// 任务最终状态；任务在派发过程中被删除时为 None
    pub status: Option<PrintJobStatus>,
    pub error_message: Option<String>,
}

/// 已受理的派发
#[derive(Debug)]
pub struct DispatchTicket {
    job_id: JobId,
    printer_name: String,
    receiver: oneshot::Receiver<DispatchReport>,
}

impl DispatchTicket {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn printer_name(&self) -> &str {
        &self.printer_name
    }

    /// 等待派发完成
    pub async fn outcome(self) -> Result<DispatchReport> {
        self.receiver
            .await
            .map_err(|_| PacsError::Internal(format!("dispatch of print job {} was abandoned", self.job_id)))
    }
}

struct DispatchTask {
    job: PrintJob,
    target: PrinterTarget,
    reply: oneshot::Sender<DispatchReport>,
}

enum TransportFault {
    TimedOut,
    Aborted(String),
}

struct DispatchContext {
    jobs: Arc<PrintJobStore>,
    archive: Arc<ArchiveIndex>,
    transport: Arc<dyn PrintTransport>,
    in_flight: Mutex<HashSet<JobId>>,
    transport_timeout: Duration,
}

/// 打印派发协调器
pub struct PrintDispatcher {
    context: Arc<DispatchContext>,
    printers: Arc<PrinterDirectory>,
    calling_ae_title: String,
    sender: RwLock<Option<mpsc::Sender<DispatchTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PrintDispatcher {
    /// 启动工作任务，必须在 tokio 运行时内调用
    pub fn new(
        jobs: Arc<PrintJobStore>,
        archive: Arc<ArchiveIndex>,
        printers: Arc<PrinterDirectory>,
        transport: Arc<dyn PrintTransport>,
        config: DispatchConfig,
    ) -> Self {
        let worker_count = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let context = Arc::new(DispatchContext {
            jobs,
            archive,
            transport,
            in_flight: Mutex::new(HashSet::new()),
            transport_timeout: config.transport_timeout,
        });

        let workers = (0..worker_count)
            .map(|id| tokio::spawn(run_worker(id, receiver.clone(), context.clone())))
            .collect();

        info!(
            "Print dispatcher started with {} workers, queue capacity {}",
            worker_count, config.queue_capacity
        );

        Self {
            context,
            printers,
            calling_ae_title: config.calling_ae_title,
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// 受理派发请求，立即返回票据
    pub async fn dispatch(&self, job_id: JobId, printer_name: &str) -> Result<DispatchTicket> {
        let printer = self.printers.get(printer_name).await?;

        let job = {
            let mut in_flight = self.context.in_flight.lock().await;
            let job = self.context.jobs.get(job_id).await?;
            if job.status != PrintJobStatus::Created {
                return Err(PacsError::InvalidStateTransition {
                    from: job.status.to_string(),
                    to: PrintJobStatus::ImageReceived.to_string(),
                });
            }
            if !in_flight.insert(job_id) {
                warn!("Print job {} is already being dispatched", job_id);
                return Err(PacsError::InvalidStateTransition {
                    from: job.status.to_string(),
                    to: PrintJobStatus::ImageReceived.to_string(),
                });
            }
            job
        };

        match self.enqueue(job, &printer.name, PrinterTarget::new(&printer, &self.calling_ae_title)).await {
            Ok(ticket) => Ok(ticket),
            Err(e) => {
                self.context.in_flight.lock().await.remove(&job_id);
                Err(e)
            }
        }
    }

    async fn enqueue(&self, job: PrintJob, printer_name: &str, target: PrinterTarget) -> Result<DispatchTicket> {
        let job_id = job.job_id;
        let sender = self
            .sender
            .read()
            .await
            .clone()
            .ok_or_else(shut_down)?;

        // 先占用队列位置，任务记录只在确定能入队后修改
        let permit = sender.reserve().await.map_err(|_| shut_down())?;
        self.context.jobs.record_printer(job_id, printer_name).await?;

        let (reply, receiver) = oneshot::channel();
        permit.send(DispatchTask { job, target, reply });

        info!("Accepted print job {} for printer {}", job_id, printer_name);
        Ok(DispatchTicket {
            job_id,
            printer_name: printer_name.to_string(),
            receiver,
        })
    }

    pub async fn in_flight(&self) -> usize {
        self.context.in_flight.lock().await.len()
    }

    /// 关闭队列并等待已受理的派发执行完毕
    pub async fn shutdown(&self) {
        self.sender.write().await.take();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Dispatch worker ended abnormally: {}", e);
            }
        }
        info!("Print dispatcher stopped");
    }
}

fn shut_down() -> PacsError {
    PacsError::Internal("print dispatcher is shut down".to_string())
}

async fn run_worker(id: usize, receiver: Arc<Mutex<mpsc::Receiver<DispatchTask>>>, context: Arc<DispatchContext>) {
    debug!("Dispatch worker {} started", id);
    loop {
        let task = receiver.lock().await.recv().await;
        let Some(DispatchTask { job, target, reply }) = task else { break };

        let job_id = job.job_id;
        let printer_name = target.printer_name.clone();

        // 单个派发中的 panic 不能带走工作任务，也不能遗留在途标记
        let execution = {
            let context = context.clone();
            tokio::spawn(async move { context.execute(&job, &target).await })
        };
        let report = match execution.await {
            Ok(report) => report,
            Err(e) => {
                error!("Dispatch of print job {} aborted: {}", job_id, e);
                DispatchReport {
                    job_id,
                    printer_name,
                    status: None,
                    error_message: Some(format!("dispatch of print job {} aborted: {}", job_id, e)),
                }
            }
        };
        context.in_flight.lock().await.remove(&job_id);

        if reply.send(report).is_err() {
            debug!("Ticket for print job {} was dropped before completion", job_id);
        }
    }
    debug!("Dispatch worker {} stopped", id);
}

impl DispatchContext {
    async fn execute(&self, job: &PrintJob, target: &PrinterTarget) -> DispatchReport {
        let source = self.resolve_source(job).await;

        let attempt = {
            let transport = self.transport.clone();
            let target = target.clone();
            let film_session = job.film_session.clone();
            let film_box = job.film_box.clone();
            self.call_transport(async move {
                transport
                    .attempt_print(&target, &film_session, &film_box, &source)
                    .await
            })
            .await
        };
        let outcome = match attempt {
            Ok(outcome) => outcome,
            Err(TransportFault::TimedOut) => TransportOutcome::failed(format!(
                "printer {} did not respond within {}s",
                target.printer_name,
                self.transport_timeout.as_secs()
            )),
            Err(TransportFault::Aborted(reason)) => TransportOutcome::failed(format!(
                "print transport for printer {} aborted: {}",
                target.printer_name, reason
            )),
        };

        match self.apply_outcome(job.job_id, target, outcome).await {
            Ok(updated) => DispatchReport {
                job_id: job.job_id,
                printer_name: target.printer_name.clone(),
                status: Some(updated.status),
                error_message: updated.error_message,
            },
            Err(e) => {
                warn!("Could not record print outcome for job {}: {}", job.job_id, e);
                DispatchReport {
                    job_id: job.job_id,
                    printer_name: target.printer_name.clone(),
                    status: None,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    /// 在独立任务中调用传输，超时或 panic 都转换为故障
    async fn call_transport<T, F>(&self, call: F) -> std::result::Result<T, TransportFault>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut handle = tokio::spawn(call);
        match tokio::time::timeout(self.transport_timeout, &mut handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Print transport task failed: {}", e);
                Err(TransportFault::Aborted(e.to_string()))
            }
            Err(_) => {
                handle.abort();
                Err(TransportFault::TimedOut)
            }
        }
    }

    /// 检查不存在时返回空源，由传输决定如何处理
    async fn resolve_source(&self, job: &PrintJob) -> ImageSource {
        let file_paths = match &job.study_instance_uid {
            Some(study_uid) => match self.archive.print_source(study_uid).await {
                Some(paths) => paths,
                None => {
                    warn!("Print job {} references study {} which is not archived", job.job_id, study_uid);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        ImageSource {
            study_instance_uid: job.study_instance_uid.clone(),
            file_paths,
        }
    }

    async fn apply_outcome(&self, job_id: JobId, target: &PrinterTarget, outcome: TransportOutcome) -> Result<PrintJob> {
        match outcome.status {
            TransportStatus::Succeeded => {
                self.jobs
                    .transition(
                        job_id,
                        PrintJobStatus::ImageReceived,
                        TransitionDetail::image(outcome.image_ref.clone()),
                    )
                    .await?;

                let commit = {
                    let transport = self.transport.clone();
                    let target = target.clone();
                    let image_ref = outcome.image_ref.clone();
                    self.call_transport(async move { transport.confirm_commit(&target, image_ref.as_deref()).await })
                        .await
                };
                let detail = match commit {
                    Ok(Ok(())) => {
                        return self
                            .jobs
                            .transition(job_id, PrintJobStatus::Completed, TransitionDetail::none())
                            .await;
                    }
                    Ok(Err(detail)) => detail,
                    Err(TransportFault::TimedOut) => format!(
                        "printer {} did not confirm the print within {}s",
                        target.printer_name,
                        self.transport_timeout.as_secs()
                    ),
                    Err(TransportFault::Aborted(reason)) => format!(
                        "print confirmation for printer {} aborted: {}",
                        target.printer_name, reason
                    ),
                };
                self.jobs
                    .transition(job_id, PrintJobStatus::Failed, TransitionDetail::error(detail))
                    .await
            }
            TransportStatus::PartiallySucceeded => {
                self.jobs
                    .transition(
                        job_id,
                        PrintJobStatus::ImageReceived,
                        TransitionDetail::image(outcome.image_ref),
                    )
                    .await?;
                let detail = outcome
                    .error_detail
                    .unwrap_or_else(|| format!("printer {} reported a partial print", target.printer_name));
                self.jobs
                    .transition(job_id, PrintJobStatus::Failed, TransitionDetail::error(detail))
                    .await
            }
            TransportStatus::Failed => {
                let detail = TransitionDetail {
                    error_message: outcome.error_detail,
                    image_path: None,
                };
                self.jobs.transition(job_id, PrintJobStatus::Failed, detail).await
            }
        }
    }
}
