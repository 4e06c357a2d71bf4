//! 打印任务状态机
//!
//! 打印任务生命周期中允许的状态转换只在这里定义。

use pacs_core::{PacsError, PrintJobStatus, Result};
use std::collections::HashSet;

/// 打印任务状态机
#[derive(Debug)]
pub struct PrintJobStateMachine {
    transitions: HashSet<(PrintJobStatus, PrintJobStatus)>,
}

impl PrintJobStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashSet::new();

        transitions.insert((PrintJobStatus::Created, PrintJobStatus::ImageReceived));
        transitions.insert((PrintJobStatus::Created, PrintJobStatus::Failed));
        transitions.insert((PrintJobStatus::ImageReceived, PrintJobStatus::Completed));
        transitions.insert((PrintJobStatus::ImageReceived, PrintJobStatus::Failed));

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: PrintJobStatus, to: PrintJobStatus) -> bool {
        self.transitions.contains(&(from, to))
    }

    /// 校验状态转换
    pub fn validate(&self, from: PrintJobStatus, to: PrintJobStatus) -> Result<()> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            Err(PacsError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// 从某状态出发可达的下一状态
    pub fn next_states(&self, current: PrintJobStatus) -> Vec<PrintJobStatus> {
        PrintJobStatus::ALL
            .into_iter()
            .filter(|to| self.can_transition(current, *to))
            .collect()
    }
}

impl Default for PrintJobStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
