//! # PACS Core
//!
//! 胶片打印子系统的核心模块，提供归档与打印数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod print;
pub mod utils;

pub use error::{FieldViolation, PacsError, Result};
pub use models::*;
pub use print::*;
