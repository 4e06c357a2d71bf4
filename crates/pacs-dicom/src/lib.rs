//! # DICOM打印模块
//!
//! 打印SCU的传输边界、Basic Print Management 交换计划以及空运行传输。

pub mod dry_run;
pub mod print_exchange;
pub mod print_scu;
pub mod sop_classes;

pub use dry_run::DryRunTransport;
pub use print_exchange::{ExchangeStep, NCommand, PrintExchangePlan};
pub use print_scu::{ImageSource, PrintTransport, TransportOutcome, TransportStatus};
