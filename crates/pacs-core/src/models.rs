//! 影像归档数据模型定义
//!
//! Patient → Study → Series → Instance 四级层次，计数字段由归档索引维护。

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// 患者基本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: String,                    // 医院内部患者ID
    pub patient_name: Option<String>,          // 患者姓名
    pub patient_birth_date: Option<NaiveDate>, // 出生日期
    pub patient_sex: Option<Sex>,              // 性别
    pub create_time: DateTime<Utc>,
    pub number_of_studies: u32,
    pub number_of_series: u32,
    pub number_of_instances: u32,
}

/// 患者人口学信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub patient_name: Option<String>,
    pub patient_birth_date: Option<NaiveDate>,
    pub patient_sex: Option<Sex>,
}

/// 性别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    /// 从 DICOM (0010,0040) 代码解析
    pub fn from_dicom(code: &str) -> Option<Self> {
        match code.trim() {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            "O" => Some(Sex::Other),
            _ => None,
        }
    }

    pub fn as_dicom(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Other => "O",
        }
    }
}

/// 检查信息
///
/// 患者姓名/性别/出生日期是首个实例入库时的快照，之后患者信息的修改不会回写。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub study_instance_uid: String, // DICOM Study Instance UID
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub patient_sex: Option<Sex>,
    pub patient_birth_date: Option<NaiveDate>,
    pub study_date: Option<NaiveDate>,
    pub study_time: Option<NaiveTime>,
    pub study_description: Option<String>,
    pub accession_number: Option<String>, // 检查号
    pub modality: Option<String>,         // 检查设备类型 (CT, MR, DR等)
    pub institution_name: Option<String>,
    pub create_time: DateTime<Utc>,
    pub number_of_study_related_series: u32,
    pub number_of_study_related_instances: u32,
}

/// 序列信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub series_instance_uid: String, // DICOM Series Instance UID
    pub study_instance_uid: String,
    pub modality: Option<String>,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub slice_thickness: Option<String>,
    pub series_date: Option<NaiveDate>,
    pub create_time: DateTime<Utc>,
    pub number_of_instances: u32,
}

/// 影像实例信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub sop_instance_uid: String, // DICOM SOP Instance UID
    pub series_instance_uid: String,
    pub sop_class_uid: String,
    pub instance_number: Option<i32>,
    pub file_path: String,
    pub geometry: ImageGeometry,
    pub create_time: DateTime<Utc>,
}

/// 像素/几何元数据，归档核心不解释其内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGeometry {
    pub columns: u32,
    pub rows: u32,
    pub photometric_interpretation: Option<String>,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub pixel_representation: u16,
    pub samples_per_pixel: u16,
    pub pixel_spacing: Option<String>,
    pub image_orientation_patient: Option<String>,
    pub image_position_patient: Option<String>,
    pub frame_of_reference_uid: Option<String>,
    pub image_type: Option<String>,
    pub window_center: Option<String>,
    pub window_width: Option<String>,
}
