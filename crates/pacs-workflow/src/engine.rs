//! 打印工作流引擎
//!
//! 协调归档索引、打印任务存储、打印机目录和派发器，对外提供统一接口。

use crate::dispatch::{DispatchConfig, DispatchTicket, PrintDispatcher};
use crate::job_store::PrintJobStore;
use crate::printers::PrinterDirectory;
use crate::query::{Page, PrintJobFilter, StatusCounts};
use pacs_archive::ArchiveIndex;
use pacs_core::{JobId, PacsError, PrintJob, PrintJobRequest, Printer, Result};
use pacs_dicom::PrintTransport;
use std::sync::Arc;

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// 打印工作流引擎
pub struct PrintWorkflow {
    archive: Arc<ArchiveIndex>,
    jobs: Arc<PrintJobStore>,
    printers: Arc<PrinterDirectory>,
    dispatcher: PrintDispatcher,
    default_page_size: usize,
}

impl PrintWorkflow {
    /// 创建新的工作流引擎，必须在 tokio 运行时内调用
    pub fn new(archive: Arc<ArchiveIndex>, transport: Arc<dyn PrintTransport>, config: DispatchConfig) -> Self {
        let jobs = Arc::new(PrintJobStore::new());
        let printers = Arc::new(PrinterDirectory::new());
        let dispatcher = PrintDispatcher::new(jobs.clone(), archive.clone(), printers.clone(), transport, config);

        Self {
            archive,
            jobs,
            printers,
            dispatcher,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn archive(&self) -> &Arc<ArchiveIndex> {
        &self.archive
    }

    pub fn jobs(&self) -> &Arc<PrintJobStore> {
        &self.jobs
    }

    /// 创建打印任务
    pub async fn create_print_job(&self, request: PrintJobRequest) -> Result<PrintJob> {
        self.jobs.create(&request).await
    }

    /// 查询打印任务
    pub async fn list_print_jobs(&self, filter: &PrintJobFilter, page: usize, page_size: usize) -> Result<Page<PrintJob>> {
        self.jobs.list(filter, page, page_size).await
    }

    pub async fn get_print_job(&self, job_id: JobId) -> Result<PrintJob> {
        self.jobs.get(job_id).await
    }

    pub async fn delete_print_job(&self, job_id: JobId) -> Result<PrintJob> {
        self.jobs.delete(job_id).await
    }

    /// 派发打印任务，未指定打印机时使用默认打印机
    pub async fn dispatch_print_job(&self, job_id: JobId, printer_name: Option<&str>) -> Result<DispatchTicket> {
        let printer_name = match printer_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => self
                .printers
                .default_printer()
                .await
                .map(|printer| printer.name)
                .ok_or_else(|| PacsError::NotFound("default printer".to_string()))?,
        };
        self.dispatcher.dispatch(job_id, &printer_name).await
    }

    /// 按状态统计
    pub async fn print_job_stats(&self, filter: &PrintJobFilter) -> StatusCounts {
        self.jobs.status_counts(filter).await
    }

    pub async fn list_printers(&self) -> Vec<Printer> {
        self.printers.list().await
    }

    pub async fn add_printer(&self, printer: Printer) -> Result<Printer> {
        self.printers.add(printer).await
    }

    pub async fn remove_printer(&self, name: &str) -> Result<Printer> {
        self.printers.remove(name).await
    }

    pub async fn set_default_printer(&self, name: &str) -> Result<()> {
        self.printers.set_default(name).await
    }

    /// 批量注册配置中的打印机
    pub async fn load_printers(&self, printers: Vec<Printer>) -> Result<usize> {
        self.printers.load(printers).await
    }

    /// 停止接收派发并等待进行中的派发完成
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}
