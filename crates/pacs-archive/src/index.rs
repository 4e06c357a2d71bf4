//! 归档索引
//!
//! 维护 Patient/Study/Series/Instance 记录及其派生计数。每次变更都在同一把写锁内
//! 完成：先校验、后修改，修改阶段不会失败，因此行变更与计数更新总是一起生效。

use crate::models::{IngestOutcome, NewInstance, NewSeries, NewStudy, RemovalOutcome};
use chrono::{DateTime, Utc};
use pacs_core::utils::is_valid_dicom_uid;
use pacs_core::{Demographics, FieldViolation, Instance, PacsError, Patient, Result, Series, Study};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 归档中各层级的行数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub patients: usize,
    pub studies: usize,
    pub series: usize,
    pub instances: usize,
}

#[derive(Debug, Default)]
struct ArchiveState {
    patients: HashMap<String, Patient>,
    studies: HashMap<String, Study>,
    series: HashMap<String, Series>,
    instances: HashMap<String, Instance>,
}

/// 归档索引
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    state: RwLock<ArchiveState>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 归档一个实例，首次引用时创建患者/检查/序列
    pub async fn add_instance(
        &self,
        study: NewStudy,
        series: NewSeries,
        instance: NewInstance,
    ) -> Result<IngestOutcome> {
        validate_ingest(&study, &series, &instance)?;

        let mut state = self.state.write().await;
        state.check_ingest(&study, &series, &instance)?;
        let outcome = state.apply_ingest(&study, &series, &instance, Utc::now());
        debug_assert!(state.verify_counts().is_ok(), "archive counters out of sync");

        tracing::debug!(
            "Archived instance {} (series {}, study {}, patient {})",
            instance.sop_instance_uid,
            series.series_instance_uid,
            study.study_instance_uid,
            study.patient_id
        );
        Ok(outcome)
    }

    /// 删除实例，并移除因此变空的上级记录
    pub async fn delete_instance(&self, sop_instance_uid: &str) -> Result<RemovalOutcome> {
        let mut state = self.state.write().await;
        let (series_uid, study_uid, patient_id) = state.instance_lineage(sop_instance_uid)?;

        state.instances.remove(sop_instance_uid);
        if let Some(series) = state.series.get_mut(&series_uid) {
            series.number_of_instances = series.number_of_instances.saturating_sub(1);
        }
        if let Some(study) = state.studies.get_mut(&study_uid) {
            study.number_of_study_related_instances = study.number_of_study_related_instances.saturating_sub(1);
        }
        if let Some(patient) = state.patients.get_mut(&patient_id) {
            patient.number_of_instances = patient.number_of_instances.saturating_sub(1);
        }

        let mut outcome = RemovalOutcome {
            removed_instances: 1,
            ..Default::default()
        };
        state.prune_series_if_empty(&series_uid, &study_uid, &patient_id, &mut outcome);
        debug_assert!(state.verify_counts().is_ok(), "archive counters out of sync");

        tracing::debug!("Deleted instance {}: {:?}", sop_instance_uid, outcome);
        Ok(outcome)
    }

    /// 删除整个序列
    pub async fn delete_series(&self, series_instance_uid: &str) -> Result<RemovalOutcome> {
        let mut state = self.state.write().await;
        let (study_uid, patient_id) = state.series_lineage(series_instance_uid)?;

        let mut outcome = RemovalOutcome::default();
        state.drop_series(series_instance_uid, &study_uid, &patient_id, &mut outcome);
        debug_assert!(state.verify_counts().is_ok(), "archive counters out of sync");

        tracing::info!(
            "Deleted series {} ({} instances)",
            series_instance_uid,
            outcome.removed_instances
        );
        Ok(outcome)
    }

    /// 删除整个检查
    pub async fn delete_study(&self, study_instance_uid: &str) -> Result<RemovalOutcome> {
        let mut state = self.state.write().await;
        let patient_id = state.study_lineage(study_instance_uid)?;

        let series_uids: Vec<String> = state
            .series
            .values()
            .filter(|series| series.study_instance_uid == study_instance_uid)
            .map(|series| series.series_instance_uid.clone())
            .collect();

        let mut outcome = RemovalOutcome::default();
        for series_uid in &series_uids {
            state.drop_series(series_uid, study_instance_uid, &patient_id, &mut outcome);
        }
        // 没有序列的检查不会自行触发清理
        state.prune_study_if_empty(study_instance_uid, &patient_id, &mut outcome);
        debug_assert!(state.verify_counts().is_ok(), "archive counters out of sync");

        tracing::info!(
            "Deleted study {} ({} series, {} instances)",
            study_instance_uid,
            outcome.removed_series.len(),
            outcome.removed_instances
        );
        Ok(outcome)
    }

    /// 更新患者人口学信息
    ///
    /// 检查上的患者字段是入库时的快照，这里不会回写。返回快照已过期的检查UID，
    /// 由调用方决定是否需要处理。
    pub async fn update_patient(&self, patient_id: &str, demographics: Demographics) -> Result<Vec<String>> {
        let mut state = self.state.write().await;
        let patient = state
            .patients
            .get_mut(patient_id)
            .ok_or_else(|| PacsError::NotFound(format!("patient {}", patient_id)))?;

        patient.patient_name = demographics.patient_name.clone();
        patient.patient_birth_date = demographics.patient_birth_date;
        patient.patient_sex = demographics.patient_sex;

        let mut stale: Vec<String> = state
            .studies
            .values()
            .filter(|study| study.patient_id == patient_id)
            .filter(|study| {
                study.patient_name != demographics.patient_name
                    || study.patient_birth_date != demographics.patient_birth_date
                    || study.patient_sex != demographics.patient_sex
            })
            .map(|study| study.study_instance_uid.clone())
            .collect();
        stale.sort();

        if !stale.is_empty() {
            tracing::warn!(
                "Patient {} updated; {} studies keep the previous demographics snapshot: {:?}",
                patient_id,
                stale.len(),
                stale
            );
        }
        Ok(stale)
    }

    pub async fn patient(&self, patient_id: &str) -> Option<Patient> {
        self.state.read().await.patients.get(patient_id).cloned()
    }

    pub async fn study(&self, study_instance_uid: &str) -> Option<Study> {
        self.state.read().await.studies.get(study_instance_uid).cloned()
    }

    pub async fn series(&self, series_instance_uid: &str) -> Option<Series> {
        self.state.read().await.series.get(series_instance_uid).cloned()
    }

    pub async fn instance(&self, sop_instance_uid: &str) -> Option<Instance> {
        self.state.read().await.instances.get(sop_instance_uid).cloned()
    }

    /// 患者的所有检查，按检查日期倒序
    pub async fn studies_for_patient(&self, patient_id: &str) -> Vec<Study> {
        let state = self.state.read().await;
        let mut studies: Vec<Study> = state
            .studies
            .values()
            .filter(|study| study.patient_id == patient_id)
            .cloned()
            .collect();
        studies.sort_by(|a, b| {
            b.study_date
                .cmp(&a.study_date)
                .then_with(|| a.study_instance_uid.cmp(&b.study_instance_uid))
        });
        studies
    }

    /// 检查的所有序列，按序列号排序
    pub async fn series_for_study(&self, study_instance_uid: &str) -> Vec<Series> {
        let state = self.state.read().await;
        state.sorted_series_of(study_instance_uid).into_iter().cloned().collect()
    }

    /// 序列的所有实例，按实例号排序
    pub async fn instances_for_series(&self, series_instance_uid: &str) -> Vec<Instance> {
        let state = self.state.read().await;
        state.sorted_instances_of(series_instance_uid).into_iter().cloned().collect()
    }

    /// 打印时使用的源图像文件，检查不存在时返回 None
    pub async fn print_source(&self, study_instance_uid: &str) -> Option<Vec<String>> {
        let state = self.state.read().await;
        if !state.studies.contains_key(study_instance_uid) {
            return None;
        }

        let files = state
            .sorted_series_of(study_instance_uid)
            .into_iter()
            .flat_map(|series| state.sorted_instances_of(&series.series_instance_uid))
            .map(|instance| instance.file_path.clone())
            .collect();
        Some(files)
    }

    pub async fn stats(&self) -> ArchiveStats {
        let state = self.state.read().await;
        ArchiveStats {
            patients: state.patients.len(),
            studies: state.studies.len(),
            series: state.series.len(),
            instances: state.instances.len(),
        }
    }

    /// 重新统计所有子记录并与计数字段比对
    pub async fn verify_counts(&self) -> Result<()> {
        self.state.read().await.verify_counts()
    }
}

fn validate_ingest(study: &NewStudy, series: &NewSeries, instance: &NewInstance) -> Result<()> {
    let mut violations = Vec::new();
    if study.patient_id.trim().is_empty() {
        violations.push(FieldViolation::new("patientId", "must not be empty"));
    }
    for (field, uid) in [
        ("studyInstanceUid", &study.study_instance_uid),
        ("seriesInstanceUid", &series.series_instance_uid),
        ("sopInstanceUid", &instance.sop_instance_uid),
    ] {
        if !is_valid_dicom_uid(uid) {
            violations.push(FieldViolation::new(field, format!("'{}' is not a DICOM UID", uid)));
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(PacsError::Validation(violations))
    }
}

impl ArchiveState {
    fn check_ingest(&self, study: &NewStudy, series: &NewSeries, instance: &NewInstance) -> Result<()> {
        if self.instances.contains_key(&instance.sop_instance_uid) {
            return Err(PacsError::Conflict(format!(
                "SOP instance {} is already archived",
                instance.sop_instance_uid
            )));
        }
        if let Some(existing) = self.series.get(&series.series_instance_uid) {
            if existing.study_instance_uid != study.study_instance_uid {
                return Err(PacsError::Conflict(format!(
                    "series {} belongs to study {}, not {}",
                    series.series_instance_uid, existing.study_instance_uid, study.study_instance_uid
                )));
            }
        }
        if let Some(existing) = self.studies.get(&study.study_instance_uid) {
            if existing.patient_id != study.patient_id {
                return Err(PacsError::Conflict(format!(
                    "study {} belongs to patient {}, not {}",
                    study.study_instance_uid, existing.patient_id, study.patient_id
                )));
            }
        }
        Ok(())
    }

    fn apply_ingest(
        &mut self,
        study: &NewStudy,
        series: &NewSeries,
        instance: &NewInstance,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        let outcome = IngestOutcome {
            new_patient: !self.patients.contains_key(&study.patient_id),
            new_study: !self.studies.contains_key(&study.study_instance_uid),
            new_series: !self.series.contains_key(&series.series_instance_uid),
        };

        self.instances.insert(
            instance.sop_instance_uid.clone(),
            instance.to_instance(&series.series_instance_uid, now),
        );

        let series_row = self
            .series
            .entry(series.series_instance_uid.clone())
            .or_insert_with(|| series.to_series(&study.study_instance_uid, now));
        series_row.number_of_instances += 1;

        let study_row = self
            .studies
            .entry(study.study_instance_uid.clone())
            .or_insert_with(|| study.to_study(now));
        study_row.number_of_study_related_instances += 1;
        if outcome.new_series {
            study_row.number_of_study_related_series += 1;
        }

        let patient_row = self
            .patients
            .entry(study.patient_id.clone())
            .or_insert_with(|| study.to_patient(now));
        patient_row.number_of_instances += 1;
        if outcome.new_series {
            patient_row.number_of_series += 1;
        }
        if outcome.new_study {
            patient_row.number_of_studies += 1;
        }

        outcome
    }

    fn study_lineage(&self, study_uid: &str) -> Result<String> {
        let study = self
            .studies
            .get(study_uid)
            .ok_or_else(|| PacsError::NotFound(format!("study {}", study_uid)))?;
        if !self.patients.contains_key(&study.patient_id) {
            return Err(PacsError::Internal(format!(
                "study {} references missing patient {}",
                study_uid, study.patient_id
            )));
        }
        Ok(study.patient_id.clone())
    }

    fn series_lineage(&self, series_uid: &str) -> Result<(String, String)> {
        let series = self
            .series
            .get(series_uid)
            .ok_or_else(|| PacsError::NotFound(format!("series {}", series_uid)))?;
        let patient_id = self.study_lineage(&series.study_instance_uid).map_err(|e| match e {
            PacsError::NotFound(_) => PacsError::Internal(format!(
                "series {} references missing study {}",
                series_uid, series.study_instance_uid
            )),
            other => other,
        })?;
        Ok((series.study_instance_uid.clone(), patient_id))
    }

    fn instance_lineage(&self, sop_uid: &str) -> Result<(String, String, String)> {
        let instance = self
            .instances
            .get(sop_uid)
            .ok_or_else(|| PacsError::NotFound(format!("instance {}", sop_uid)))?;
        let (study_uid, patient_id) = self.series_lineage(&instance.series_instance_uid).map_err(|e| match e {
            PacsError::NotFound(_) => PacsError::Internal(format!(
                "instance {} references missing series {}",
                sop_uid, instance.series_instance_uid
            )),
            other => other,
        })?;
        Ok((instance.series_instance_uid.clone(), study_uid, patient_id))
    }

    /// 移除序列下全部实例，再移除序列本身
    fn drop_series(&mut self, series_uid: &str, study_uid: &str, patient_id: &str, outcome: &mut RemovalOutcome) {
        let before = self.instances.len();
        self.instances
            .retain(|_, instance| instance.series_instance_uid != series_uid);
        let removed = (before - self.instances.len()) as u32;

        if let Some(series) = self.series.get_mut(series_uid) {
            series.number_of_instances = 0;
        }
        if let Some(study) = self.studies.get_mut(study_uid) {
            study.number_of_study_related_instances = study.number_of_study_related_instances.saturating_sub(removed);
        }
        if let Some(patient) = self.patients.get_mut(patient_id) {
            patient.number_of_instances = patient.number_of_instances.saturating_sub(removed);
        }
        outcome.removed_instances += removed;

        self.prune_series_if_empty(series_uid, study_uid, patient_id, outcome);
    }

    fn prune_series_if_empty(
        &mut self,
        series_uid: &str,
        study_uid: &str,
        patient_id: &str,
        outcome: &mut RemovalOutcome,
    ) {
        let empty = self
            .series
            .get(series_uid)
            .is_some_and(|series| series.number_of_instances == 0);
        if !empty {
            return;
        }

        self.series.remove(series_uid);
        if let Some(study) = self.studies.get_mut(study_uid) {
            study.number_of_study_related_series = study.number_of_study_related_series.saturating_sub(1);
        }
        if let Some(patient) = self.patients.get_mut(patient_id) {
            patient.number_of_series = patient.number_of_series.saturating_sub(1);
        }
        outcome.removed_series.push(series_uid.to_string());

        self.prune_study_if_empty(study_uid, patient_id, outcome);
    }

    fn prune_study_if_empty(&mut self, study_uid: &str, patient_id: &str, outcome: &mut RemovalOutcome) {
        let empty = self
            .studies
            .get(study_uid)
            .is_some_and(|study| study.number_of_study_related_series == 0);
        if !empty {
            return;
        }

        self.studies.remove(study_uid);
        if let Some(patient) = self.patients.get_mut(patient_id) {
            patient.number_of_studies = patient.number_of_studies.saturating_sub(1);
        }
        outcome.removed_study = Some(study_uid.to_string());

        let patient_empty = self
            .patients
            .get(patient_id)
            .is_some_and(|patient| patient.number_of_studies == 0);
        if patient_empty {
            self.patients.remove(patient_id);
            outcome.removed_patient = Some(patient_id.to_string());
        }
    }

    fn sorted_series_of(&self, study_uid: &str) -> Vec<&Series> {
        let mut series: Vec<&Series> = self
            .series
            .values()
            .filter(|series| series.study_instance_uid == study_uid)
            .collect();
        series.sort_by(|a, b| {
            a.series_number
                .cmp(&b.series_number)
                .then_with(|| a.series_instance_uid.cmp(&b.series_instance_uid))
        });
        series
    }

    fn sorted_instances_of(&self, series_uid: &str) -> Vec<&Instance> {
        let mut instances: Vec<&Instance> = self
            .instances
            .values()
            .filter(|instance| instance.series_instance_uid == series_uid)
            .collect();
        instances.sort_by(|a, b| {
            a.instance_number
                .cmp(&b.instance_number)
                .then_with(|| a.sop_instance_uid.cmp(&b.sop_instance_uid))
        });
        instances
    }

    fn verify_counts(&self) -> Result<()> {
        let mut series_instances: HashMap<&str, u32> = HashMap::new();
        let mut study_series: HashMap<&str, u32> = HashMap::new();
        let mut study_instances: HashMap<&str, u32> = HashMap::new();
        let mut patient_studies: HashMap<&str, u32> = HashMap::new();
        let mut patient_series: HashMap<&str, u32> = HashMap::new();
        let mut patient_instances: HashMap<&str, u32> = HashMap::new();

        for study in self.studies.values() {
            if !self.patients.contains_key(&study.patient_id) {
                return Err(PacsError::Internal(format!("orphan study {}", study.study_instance_uid)));
            }
            *patient_studies.entry(study.patient_id.as_str()).or_default() += 1;
        }
        for series in self.series.values() {
            let study = self
                .studies
                .get(&series.study_instance_uid)
                .ok_or_else(|| PacsError::Internal(format!("orphan series {}", series.series_instance_uid)))?;
            *study_series.entry(study.study_instance_uid.as_str()).or_default() += 1;
            *patient_series.entry(study.patient_id.as_str()).or_default() += 1;
        }
        for instance in self.instances.values() {
            let series = self
                .series
                .get(&instance.series_instance_uid)
                .ok_or_else(|| PacsError::Internal(format!("orphan instance {}", instance.sop_instance_uid)))?;
            let study = self
                .studies
                .get(&series.study_instance_uid)
                .ok_or_else(|| PacsError::Internal(format!("orphan series {}", series.series_instance_uid)))?;
            *series_instances.entry(series.series_instance_uid.as_str()).or_default() += 1;
            *study_instances.entry(study.study_instance_uid.as_str()).or_default() += 1;
            *patient_instances.entry(study.patient_id.as_str()).or_default() += 1;
        }

        let live = |counts: &HashMap<&str, u32>, key: &str| counts.get(key).copied().unwrap_or(0);
        let mismatch = |level: &str, key: &str, field: &str, stored: u32, actual: u32| {
            PacsError::Internal(format!(
                "{} {} has {} = {}, but {} rows exist",
                level, key, field, stored, actual
            ))
        };

        for series in self.series.values() {
            let actual = live(&series_instances, &series.series_instance_uid);
            if series.number_of_instances != actual {
                return Err(mismatch("series", &series.series_instance_uid, "numberOfInstances", series.number_of_instances, actual));
            }
        }
        for study in self.studies.values() {
            let uid = study.study_instance_uid.as_str();
            let actual = live(&study_series, uid);
            if study.number_of_study_related_series != actual {
                return Err(mismatch("study", uid, "numberOfStudyRelatedSeries", study.number_of_study_related_series, actual));
            }
            let actual = live(&study_instances, uid);
            if study.number_of_study_related_instances != actual {
                return Err(mismatch("study", uid, "numberOfStudyRelatedInstances", study.number_of_study_related_instances, actual));
            }
        }
        for patient in self.patients.values() {
            let id = patient.patient_id.as_str();
            let actual = live(&patient_studies, id);
            if patient.number_of_studies != actual {
                return Err(mismatch("patient", id, "numberOfStudies", patient.number_of_studies, actual));
            }
            let actual = live(&patient_series, id);
            if patient.number_of_series != actual {
                return Err(mismatch("patient", id, "numberOfSeries", patient.number_of_series, actual));
            }
            let actual = live(&patient_instances, id);
            if patient.number_of_instances != actual {
                return Err(mismatch("patient", id, "numberOfInstances", patient.number_of_instances, actual));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacs_core::Sex;
    use std::sync::Arc;

    fn study(patient_id: &str, study_uid: &str, name: &str) -> NewStudy {
        NewStudy {
            study_instance_uid: study_uid.to_string(),
            patient_id: patient_id.to_string(),
            demographics: Demographics {
                patient_name: Some(name.to_string()),
                patient_birth_date: None,
                patient_sex: Some(Sex::Female),
            },
            modality: Some("CT".to_string()),
            ..Default::default()
        }
    }

    fn series(series_uid: &str, number: i32) -> NewSeries {
        NewSeries {
            series_instance_uid: series_uid.to_string(),
            series_number: Some(number),
            modality: Some("CT".to_string()),
            ..Default::default()
        }
    }

    fn instance(sop_uid: &str, number: i32) -> NewInstance {
        NewInstance {
            sop_instance_uid: sop_uid.to_string(),
            sop_class_uid: "1.2.840.10008.5.1.4.1.1.2".to_string(),
            instance_number: Some(number),
            file_path: format!("/data/dicom/{}.dcm", sop_uid),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_instance_of_study_counts_once() {
        let index = ArchiveIndex::new();

        let outcome = index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IngestOutcome {
                new_patient: true,
                new_study: true,
                new_series: true
            }
        );

        let patient = index.patient("P1").await.unwrap();
        assert_eq!(patient.number_of_studies, 1);
        assert_eq!(patient.number_of_instances, 1);

        for n in 2..=4 {
            let outcome = index
                .add_instance(
                    study("P1", "1.1", "Doe^Jane"),
                    series("1.1.1", 1),
                    instance(&format!("1.1.1.{}", n), n),
                )
                .await
                .unwrap();
            assert!(!outcome.new_study);

            let patient = index.patient("P1").await.unwrap();
            assert_eq!(patient.number_of_studies, 1);
            assert_eq!(patient.number_of_instances, n as u32);
        }

        let study_row = index.study("1.1").await.unwrap();
        assert_eq!(study_row.number_of_study_related_instances, 4);
        assert_eq!(study_row.number_of_study_related_series, 1);
        index.verify_counts().await.unwrap();
    }

    #[tokio::test]
    async fn test_first_instance_wins_for_demographics() {
        let index = ArchiveIndex::new();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap();
        index
            .add_instance(study("P1", "1.1", "Smith^Jane"), series("1.1.1", 1), instance("1.1.1.2", 2))
            .await
            .unwrap();

        let study_row = index.study("1.1").await.unwrap();
        assert_eq!(study_row.patient_name.as_deref(), Some("Doe^Jane"));
    }

    #[tokio::test]
    async fn test_conflicts_leave_index_unchanged() {
        let index = ArchiveIndex::new();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap();
        let before = index.stats().await;

        // 重复实例
        let err = index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PacsError::Conflict(_)));

        // 序列挂到另一个检查
        let err = index
            .add_instance(study("P1", "1.2", "Doe^Jane"), series("1.1.1", 1), instance("1.2.1.1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PacsError::Conflict(_)));

        // 检查挂到另一个患者
        let err = index
            .add_instance(study("P2", "1.1", "Roe^Rick"), series("1.1.2", 2), instance("1.1.2.1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PacsError::Conflict(_)));

        let err = index
            .add_instance(study("", "bad uid", "x"), series("1.9", 1), instance("1.9.1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, PacsError::Validation(_)));

        assert_eq!(index.stats().await, before);
        assert!(index.patient("P2").await.is_none());
        index.verify_counts().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_instance_prunes_empty_parents() {
        let index = ArchiveIndex::new();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.2", 2), instance("1.1.2.1", 1))
            .await
            .unwrap();

        let outcome = index.delete_instance("1.1.1.1").await.unwrap();
        assert_eq!(outcome.removed_series, vec!["1.1.1".to_string()]);
        assert_eq!(outcome.removed_study, None);

        let patient = index.patient("P1").await.unwrap();
        assert_eq!(patient.number_of_series, 1);
        assert_eq!(patient.number_of_instances, 1);

        let outcome = index.delete_instance("1.1.2.1").await.unwrap();
        assert_eq!(outcome.removed_study.as_deref(), Some("1.1"));
        assert_eq!(outcome.removed_patient.as_deref(), Some("P1"));
        assert_eq!(index.stats().await, ArchiveStats::default());

        let err = index.delete_instance("1.1.2.1").await.unwrap_err();
        assert!(matches!(err, PacsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_series_and_study() {
        let index = ArchiveIndex::new();
        for (series_uid, number) in [("1.1.1", 1), ("1.1.2", 2)] {
            for i in 1..=3 {
                index
                    .add_instance(
                        study("P1", "1.1", "Doe^Jane"),
                        series(series_uid, number),
                        instance(&format!("{}.{}", series_uid, i), i),
                    )
                    .await
                    .unwrap();
            }
        }
        index
            .add_instance(study("P1", "1.2", "Doe^Jane"), series("1.2.1", 1), instance("1.2.1.1", 1))
            .await
            .unwrap();

        let outcome = index.delete_series("1.1.1").await.unwrap();
        assert_eq!(outcome.removed_instances, 3);
        let study_row = index.study("1.1").await.unwrap();
        assert_eq!(study_row.number_of_study_related_series, 1);
        assert_eq!(study_row.number_of_study_related_instances, 3);

        let outcome = index.delete_study("1.1").await.unwrap();
        assert_eq!(outcome.removed_instances, 3);
        assert_eq!(outcome.removed_patient, None);

        let patient = index.patient("P1").await.unwrap();
        assert_eq!(patient.number_of_studies, 1);
        assert_eq!(patient.number_of_series, 1);
        assert_eq!(patient.number_of_instances, 1);
        index.verify_counts().await.unwrap();

        assert!(matches!(index.delete_study("1.1").await, Err(PacsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_print_source_is_ordered_and_tolerates_missing_study() {
        let index = ArchiveIndex::new();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.2", 2), instance("1.1.2.1", 1))
            .await
            .unwrap();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.2", 2))
            .await
            .unwrap();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap();

        let files = index.print_source("1.1").await.unwrap();
        assert_eq!(
            files,
            vec![
                "/data/dicom/1.1.1.1.dcm".to_string(),
                "/data/dicom/1.1.1.2.dcm".to_string(),
                "/data/dicom/1.1.2.1.dcm".to_string(),
            ]
        );
        assert!(index.print_source("9.9").await.is_none());
    }

    #[tokio::test]
    async fn test_update_patient_reports_stale_snapshots() {
        let index = ArchiveIndex::new();
        index
            .add_instance(study("P1", "1.1", "Doe^Jane"), series("1.1.1", 1), instance("1.1.1.1", 1))
            .await
            .unwrap();

        let stale = index
            .update_patient(
                "P1",
                Demographics {
                    patient_name: Some("Roe^Jane".to_string()),
                    patient_birth_date: None,
                    patient_sex: Some(Sex::Female),
                },
            )
            .await
            .unwrap();
        assert_eq!(stale, vec!["1.1".to_string()]);

        assert_eq!(index.patient("P1").await.unwrap().patient_name.as_deref(), Some("Roe^Jane"));
        assert_eq!(index.study("1.1").await.unwrap().patient_name.as_deref(), Some("Doe^Jane"));

        assert!(matches!(
            index.update_patient("P404", Demographics::default()).await,
            Err(PacsError::NotFound(_))
        ));
    }

    /// xorshift 伪随机数，保证用例可复现
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    #[tokio::test]
    async fn test_counts_hold_under_random_operation_sequences() {
        for seed in [7_u64, 42, 1337, 20240611] {
            let mut rng = XorShift(seed);
            let index = ArchiveIndex::new();
            let mut next_sop = 0_u64;

            for _ in 0..400 {
                let patient = rng.below(3);
                let study_uid = format!("1.{}.{}", patient, rng.below(3));
                let series_uid = format!("{}.{}", study_uid, rng.below(3));

                match rng.below(10) {
                    0..=5 => {
                        next_sop += 1;
                        let sop = format!("{}.{}", series_uid, next_sop);
                        index
                            .add_instance(
                                study(&format!("P{}", patient), &study_uid, "Doe^Jane"),
                                series(&series_uid, 1),
                                instance(&sop, next_sop as i32),
                            )
                            .await
                            .unwrap();
                    }
                    6 | 7 => {
                        let victims = index.instances_for_series(&series_uid).await;
                        if let Some(victim) = victims.first() {
                            index.delete_instance(&victim.sop_instance_uid).await.unwrap();
                        }
                    }
                    8 => {
                        let _ = index.delete_series(&series_uid).await;
                    }
                    _ => {
                        let _ = index.delete_study(&study_uid).await;
                    }
                }

                index.verify_counts().await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_ingest_for_one_patient() {
        let index = Arc::new(ArchiveIndex::new());
        let mut handles = Vec::new();

        for task in 0..8 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    let study_uid = format!("1.{}", task % 4);
                    let series_uid = format!("{}.{}", study_uid, i % 2);
                    index
                        .add_instance(
                            study("P1", &study_uid, "Doe^Jane"),
                            series(&series_uid, i % 2),
                            instance(&format!("2.{}.{}", task, i), i),
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let patient = index.patient("P1").await.unwrap();
        assert_eq!(patient.number_of_studies, 4);
        assert_eq!(patient.number_of_series, 8);
        assert_eq!(patient.number_of_instances, 200);
        index.verify_counts().await.unwrap();
    }
}
