//! # PACS 胶片打印
//!
//! 聚合各子模块，便于演示程序与外部集成统一引用。

pub use pacs_archive as archive;
pub use pacs_core as core;
pub use pacs_dicom as dicom;
pub use pacs_workflow as workflow;

pub use pacs_core::{JobId, PacsError, PrintJob, PrintJobRequest, PrintJobStatus, Printer, Result};
pub use pacs_workflow::{DispatchConfig, PrintJobFilter, PrintWorkflow};
