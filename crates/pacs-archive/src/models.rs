//! 入库模型 - 用于归档新实例

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pacs_core::models::*;
use serde::{Deserialize, Serialize};

/// 新检查入库模型，携带患者信息快照
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudy {
    pub study_instance_uid: String,
    pub patient_id: String,
    pub demographics: Demographics,
    pub study_date: Option<NaiveDate>,
    pub study_time: Option<NaiveTime>,
    pub study_description: Option<String>,
    pub accession_number: Option<String>,
    pub modality: Option<String>,
    pub institution_name: Option<String>,
}

impl NewStudy {
    pub(crate) fn to_patient(&self, now: DateTime<Utc>) -> Patient {
        Patient {
            patient_id: self.patient_id.clone(),
            patient_name: self.demographics.patient_name.clone(),
            patient_birth_date: self.demographics.patient_birth_date,
            patient_sex: self.demographics.patient_sex,
            create_time: now,
            number_of_studies: 0,
            number_of_series: 0,
            number_of_instances: 0,
        }
    }

    pub(crate) fn to_study(&self, now: DateTime<Utc>) -> Study {
        Study {
            study_instance_uid: self.study_instance_uid.clone(),
            patient_id: self.patient_id.clone(),
            patient_name: self.demographics.patient_name.clone(),
            patient_sex: self.demographics.patient_sex,
            patient_birth_date: self.demographics.patient_birth_date,
            study_date: self.study_date,
            study_time: self.study_time,
            study_description: self.study_description.clone(),
            accession_number: self.accession_number.clone(),
            modality: self.modality.clone(),
            institution_name: self.institution_name.clone(),
            create_time: now,
            number_of_study_related_series: 0,
            number_of_study_related_instances: 0,
        }
    }
}

/// 新序列入库模型
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeries {
    pub series_instance_uid: String,
    pub modality: Option<String>,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub slice_thickness: Option<String>,
    pub series_date: Option<NaiveDate>,
}

impl NewSeries {
    pub(crate) fn to_series(&self, study_instance_uid: &str, now: DateTime<Utc>) -> Series {
        Series {
            series_instance_uid: self.series_instance_uid.clone(),
            study_instance_uid: study_instance_uid.to_string(),
            modality: self.modality.clone(),
            series_number: self.series_number,
            series_description: self.series_description.clone(),
            slice_thickness: self.slice_thickness.clone(),
            series_date: self.series_date,
            create_time: now,
            number_of_instances: 0,
        }
    }
}

/// 新实例入库模型
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInstance {
    pub sop_instance_uid: String,
    pub sop_class_uid: String,
    pub instance_number: Option<i32>,
    pub file_path: String,
    pub geometry: ImageGeometry,
}

impl NewInstance {
    pub(crate) fn to_instance(&self, series_instance_uid: &str, now: DateTime<Utc>) -> Instance {
        Instance {
            sop_instance_uid: self.sop_instance_uid.clone(),
            series_instance_uid: series_instance_uid.to_string(),
            sop_class_uid: self.sop_class_uid.clone(),
            instance_number: self.instance_number,
            file_path: self.file_path.clone(),
            geometry: self.geometry.clone(),
            create_time: now,
        }
    }
}

/// 一次入库操作新建了哪些层级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub new_patient: bool,
    pub new_study: bool,
    pub new_series: bool,
}

/// 一次删除操作移除了哪些层级
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub removed_instances: u32,
    pub removed_series: Vec<String>,
    pub removed_study: Option<String>,
    pub removed_patient: Option<String>,
}
