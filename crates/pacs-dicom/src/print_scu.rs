//! 打印SCU传输边界
//!
//! 工作流只通过 [`PrintTransport`] 与打印机交互，PDU编解码不在本模块范围内。

use async_trait::async_trait;
use pacs_core::{FilmBox, FilmSession, PrinterTarget};
use serde::{Deserialize, Serialize};

/// 待打印的源图像
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSource {
    pub study_instance_uid: Option<String>,
    /// 按序列号、实例号排序的文件路径；检查无法解析时为空
    pub file_paths: Vec<String>,
}

impl ImageSource {
    pub fn is_empty(&self) -> bool {
        self.file_paths.is_empty()
    }
}

/// 传输结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportStatus {
    Succeeded,
    PartiallySucceeded,
    Failed,
}

/// 一次打印尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOutcome {
    pub status: TransportStatus,
    pub image_ref: Option<String>,
    pub error_detail: Option<String>,
}

impl TransportOutcome {
    pub fn succeeded(image_ref: Option<String>) -> Self {
        Self {
            status: TransportStatus::Succeeded,
            image_ref,
            error_detail: None,
        }
    }

    pub fn partially_succeeded(image_ref: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            status: TransportStatus::PartiallySucceeded,
            image_ref,
            error_detail: Some(detail.into()),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: TransportStatus::Failed,
            image_ref: None,
            error_detail: Some(detail.into()),
        }
    }
}

/// 打印传输特征
#[async_trait]
pub trait PrintTransport: Send + Sync {
    /// 执行一次完整的打印交换。传输错误应体现在返回值中，而不是 panic。
    async fn attempt_print(
        &self,
        target: &PrinterTarget,
        film_session: &FilmSession,
        film_box: &FilmBox,
        image_source: &ImageSource,
    ) -> TransportOutcome;

    /// 确认打印机已实际出片
    async fn confirm_commit(&self, _target: &PrinterTarget, _image_ref: Option<&str>) -> Result<(), String> {
        Ok(())
    }
}
