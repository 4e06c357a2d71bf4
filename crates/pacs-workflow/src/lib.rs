//! # PACS打印工作流模块
//!
//! 提供胶片打印的完整工作流管理功能，包括：
//! - 打印任务状态机：管理打印任务的生命周期
//! - 打印任务存储与查询：过滤、排序、分页与状态统计
//! - 打印机目录：维护可用打印机与默认打印机
//! - 打印派发：有界工作池执行打印交换并回写结果

pub mod dispatch;
pub mod engine;
pub mod job_store;
pub mod printers;
pub mod query;
pub mod state_machine;

// 重新导出主要类型
pub use dispatch::{DispatchConfig, DispatchReport, DispatchTicket, PrintDispatcher};
pub use engine::{PrintWorkflow, DEFAULT_PAGE_SIZE};
pub use job_store::{PrintJobStore, TransitionDetail, DEFAULT_FAILURE_MESSAGE};
pub use printers::PrinterDirectory;
pub use query::{Page, PrintJobFilter, StatusCounts};
pub use state_machine::PrintJobStateMachine;
