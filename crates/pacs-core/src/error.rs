//! 错误定义模块

use std::fmt;
use thiserror::Error;

/// 单个字段的校验失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// PACS系统统一错误类型
#[derive(Error, Debug)]
pub enum PacsError {
    #[error("验证错误: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("参数错误: {0}")]
    InvalidArgument(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("冲突: {0}")]
    Conflict(String),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl PacsError {
    /// 单字段校验错误的便捷构造
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        PacsError::Validation(vec![FieldViolation::new(field, reason)])
    }

    /// 校验错误涉及的字段名
    pub fn violated_fields(&self) -> Vec<&'static str> {
        match self {
            PacsError::Validation(violations) => violations.iter().map(|v| v.field).collect(),
            _ => Vec::new(),
        }
    }
}

/// PACS系统统一结果类型
pub type Result<T> = std::result::Result<T, PacsError>;
