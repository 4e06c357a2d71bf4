//! 胶片打印数据模型
//!
//! 打印任务 (Film Session / Film Box 参数)、打印机以及任务状态的唯一权威定义。

use crate::error::{FieldViolation, PacsError, Result};
use crate::utils::{is_valid_ae_title, is_valid_dicom_uid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 打印任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = PacsError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(JobId)
            .map_err(|_| PacsError::NotFound(format!("print job {}", s)))
    }
}

/// 打印任务状态
///
/// 数值代码、名称与显示文本只在这里映射一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintJobStatus {
    Created,
    ImageReceived,
    Completed,
    Failed,
}

impl PrintJobStatus {
    pub const ALL: [PrintJobStatus; 4] = [
        PrintJobStatus::Created,
        PrintJobStatus::ImageReceived,
        PrintJobStatus::Completed,
        PrintJobStatus::Failed,
    ];

    /// 持久化/线路上使用的数值代码
    pub fn code(&self) -> u8 {
        match self {
            PrintJobStatus::Created => 0,
            PrintJobStatus::ImageReceived => 1,
            PrintJobStatus::Completed => 2,
            PrintJobStatus::Failed => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintJobStatus::Created => "Created",
            PrintJobStatus::ImageReceived => "ImageReceived",
            PrintJobStatus::Completed => "Completed",
            PrintJobStatus::Failed => "Failed",
        }
    }

    /// 界面显示文本
    pub fn label(&self) -> &'static str {
        match self {
            PrintJobStatus::Created => "已创建",
            PrintJobStatus::ImageReceived => "已接收",
            PrintJobStatus::Completed => "已完成",
            PrintJobStatus::Failed => "失败",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PrintJobStatus::Completed | PrintJobStatus::Failed)
    }
}

impl fmt::Display for PrintJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintJobStatus {
    type Err = PacsError;

    /// 接受名称（不区分大小写）或数值代码
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code)
                .ok_or_else(|| PacsError::InvalidArgument(format!("unknown print job status code {}", code)));
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| PacsError::InvalidArgument(format!("unknown print job status '{}'", trimmed)))
    }
}

/// 打印优先级 (2000,0020)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintPriority {
    Low,
    Med,
    High,
}

impl PrintPriority {
    pub fn as_dicom(&self) -> &'static str {
        match self {
            PrintPriority::Low => "LOW",
            PrintPriority::Med => "MED",
            PrintPriority::High => "HIGH",
        }
    }
}

impl FromStr for PrintPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(PrintPriority::Low),
            "MED" => Ok(PrintPriority::Med),
            "HIGH" => Ok(PrintPriority::High),
            other => Err(format!("'{}' is not one of LOW, MED, HIGH", other)),
        }
    }
}

/// 胶片方向 (2010,0040)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilmOrientation {
    Portrait,
    Landscape,
}

impl FilmOrientation {
    pub fn as_dicom(&self) -> &'static str {
        match self {
            FilmOrientation::Portrait => "PORTRAIT",
            FilmOrientation::Landscape => "LANDSCAPE",
        }
    }
}

impl FromStr for FilmOrientation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PORTRAIT" => Ok(FilmOrientation::Portrait),
            "LANDSCAPE" => Ok(FilmOrientation::Landscape),
            other => Err(format!("'{}' is not one of PORTRAIT, LANDSCAPE", other)),
        }
    }
}

/// Film Session 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmSession {
    pub number_of_copies: u32,
    pub print_priority: PrintPriority,
    pub medium_type: String,
    pub film_destination: String,
}

/// Film Box 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmBox {
    pub print_in_color: bool,
    pub film_orientation: FilmOrientation,
    #[serde(rename = "filmSizeID")]
    pub film_size_id: String,
    pub image_display_format: String,
    pub magnification_type: String,
    pub border_density: String,
    pub empty_image_density: String,
    pub min_density: u16,
    pub max_density: u16,
}

/// 打印任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub job_id: JobId,
    #[serde(rename = "callingAE")]
    pub calling_ae: String,
    /// 引用而非拥有，检查删除后可能悬空
    #[serde(rename = "studyInstanceUID")]
    pub study_instance_uid: Option<String>,
    #[serde(flatten)]
    pub film_session: FilmSession,
    #[serde(flatten)]
    pub film_box: FilmBox,
    pub status: PrintJobStatus,
    pub error_message: Option<String>,
    pub image_path: Option<String>,
    pub printer_name: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

/// 创建打印任务的请求参数（未校验）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintJobRequest {
    #[serde(rename = "callingAE")]
    pub calling_ae: String,
    #[serde(rename = "studyInstanceUID")]
    pub study_instance_uid: Option<String>,
    pub number_of_copies: i32,
    pub print_priority: String,
    pub medium_type: String,
    pub film_destination: String,
    pub print_in_color: bool,
    pub film_orientation: String,
    #[serde(rename = "filmSizeID")]
    pub film_size_id: String,
    pub image_display_format: String,
    pub magnification_type: String,
    pub border_density: String,
    pub empty_image_density: String,
    pub min_density: i32,
    pub max_density: i32,
}

impl Default for PrintJobRequest {
    fn default() -> Self {
        Self {
            calling_ae: String::new(),
            study_instance_uid: None,
            number_of_copies: 1,
            print_priority: "MED".to_string(),
            medium_type: "BLUE FILM".to_string(),
            film_destination: "PROCESSOR".to_string(),
            print_in_color: false,
            film_orientation: "PORTRAIT".to_string(),
            film_size_id: "14INX17IN".to_string(),
            image_display_format: "STANDARD\\1,1".to_string(),
            magnification_type: "REPLICATE".to_string(),
            border_density: "BLACK".to_string(),
            empty_image_density: "BLACK".to_string(),
            min_density: 20,
            max_density: 300,
        }
    }
}

/// 通过校验的任务参数
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPrintJob {
    pub calling_ae: String,
    pub study_instance_uid: Option<String>,
    pub film_session: FilmSession,
    pub film_box: FilmBox,
}

impl PrintJobRequest {
    /// 校验全部字段，一次性报告所有不合法的字段
    pub fn validate(&self) -> Result<ValidatedPrintJob> {
        let mut violations = Vec::new();

        let calling_ae = self.calling_ae.trim().to_string();
        if !is_valid_ae_title(&calling_ae) {
            violations.push(FieldViolation::new("callingAE", "must be 1-16 characters without backslash"));
        }

        let study_instance_uid = self
            .study_instance_uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(str::to_string);
        if let Some(uid) = &study_instance_uid {
            if !is_valid_dicom_uid(uid) {
                violations.push(FieldViolation::new("studyInstanceUID", format!("'{}' is not a DICOM UID", uid)));
            }
        }

        if self.number_of_copies < 1 {
            violations.push(FieldViolation::new("numberOfCopies", "must be at least 1"));
        }

        let print_priority = match self.print_priority.parse::<PrintPriority>() {
            Ok(priority) => Some(priority),
            Err(reason) => {
                violations.push(FieldViolation::new("printPriority", reason));
                None
            }
        };

        let film_orientation = match self.film_orientation.parse::<FilmOrientation>() {
            Ok(orientation) => Some(orientation),
            Err(reason) => {
                violations.push(FieldViolation::new("filmOrientation", reason));
                None
            }
        };

        for (field, value) in [
            ("mediumType", &self.medium_type),
            ("filmDestination", &self.film_destination),
            ("filmSizeID", &self.film_size_id),
            ("imageDisplayFormat", &self.image_display_format),
        ] {
            if value.trim().is_empty() {
                violations.push(FieldViolation::new(field, "must not be empty"));
            }
        }

        let min_density = u16::try_from(self.min_density).ok();
        if min_density.is_none() {
            violations.push(FieldViolation::new("minDensity", "must be between 0 and 65535"));
        }
        let max_density = u16::try_from(self.max_density).ok();
        if max_density.is_none() {
            violations.push(FieldViolation::new("maxDensity", "must be between 0 and 65535"));
        } else if self.max_density < self.min_density {
            violations.push(FieldViolation::new("maxDensity", "must not be below minDensity"));
        }

        match (print_priority, film_orientation, min_density, max_density) {
            (Some(print_priority), Some(film_orientation), Some(min_density), Some(max_density))
                if violations.is_empty() =>
            {
                Ok(ValidatedPrintJob {
                    calling_ae,
                    study_instance_uid,
                    film_session: FilmSession {
                        number_of_copies: self.number_of_copies as u32,
                        print_priority,
                        medium_type: self.medium_type.trim().to_string(),
                        film_destination: self.film_destination.trim().to_string(),
                    },
                    film_box: FilmBox {
                        print_in_color: self.print_in_color,
                        film_orientation,
                        film_size_id: self.film_size_id.trim().to_string(),
                        image_display_format: self.image_display_format.trim().to_string(),
                        magnification_type: self.magnification_type.trim().to_string(),
                        border_density: self.border_density.trim().to_string(),
                        empty_image_density: self.empty_image_density.trim().to_string(),
                        min_density,
                        max_density,
                    },
                })
            }
            _ => Err(PacsError::Validation(violations)),
        }
    }
}

/// 打印机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Printer {
    pub name: String,
    pub ae_title: String,
    pub host: String,
    pub port: u16,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl Printer {
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        if self.name.trim().is_empty() {
            violations.push(FieldViolation::new("name", "must not be empty"));
        }
        if !is_valid_ae_title(&self.ae_title) {
            violations.push(FieldViolation::new("aeTitle", "must be 1-16 characters without backslash"));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PacsError::Validation(violations))
        }
    }
}

/// 传输层使用的打印机网络目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterTarget {
    pub printer_name: String,
    pub calling_ae_title: String,
    pub called_ae_title: String,
    pub host: String,
    pub port: u16,
}

impl PrinterTarget {
    pub fn new(printer: &Printer, calling_ae_title: impl Into<String>) -> Self {
        Self {
            printer_name: printer.name.clone(),
            calling_ae_title: calling_ae_title.into(),
            called_ae_title: printer.ae_title.clone(),
            host: printer.host.clone(),
            port: printer.port,
        }
    }
}
