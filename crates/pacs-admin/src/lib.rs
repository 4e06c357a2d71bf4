//! # PACS管理模块
//!
//! 提供配置管理与日志初始化等运维功能

pub mod config;
pub mod logging;

pub use config::{
    ConfigManager, ConfigValidator, DicomConfig, DispatchSettings, LogFormat, LoggingConfig, PrintConfig,
    PrinterConfig, QueryConfig, ServerConfig,
};
pub use logging::{build_filter, init_tracing};
