//! 打印任务查询
//!
//! 过滤、排序与分页。排序规则固定为创建时间倒序、任务ID升序，
//! 同一快照上的重复查询结果一致。

use chrono::NaiveDate;
use pacs_core::{PacsError, PrintJob, PrintJobStatus, Result};
use serde::{Deserialize, Serialize};

/// 打印任务过滤器，各条件之间为"与"关系
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJobFilter {
    /// 不区分大小写的子串匹配
    #[serde(rename = "callingAE")]
    pub calling_ae: Option<String>,
    pub study_uid: Option<String>,
    pub status: Option<PrintJobStatus>,
    /// 按创建时间的UTC日期比较
    pub date_on_or_after: Option<NaiveDate>,
}

impl PrintJobFilter {
    pub fn matches(&self, job: &PrintJob) -> bool {
        if let Some(calling_ae) = non_blank(&self.calling_ae) {
            let needle = calling_ae.to_lowercase();
            if !job.calling_ae.to_lowercase().contains(&needle) {
                return false;
            }
        }

        if let Some(study_uid) = non_blank(&self.study_uid) {
            if job.study_instance_uid.as_deref() != Some(study_uid) {
                return false;
            }
        }

        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }

        if let Some(date) = self.date_on_or_after {
            if job.create_time.date_naive() < date {
                return false;
            }
        }

        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 分页结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
}

/// 按状态统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub created: usize,
    pub image_received: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: PrintJobStatus) {
        self.total += 1;
        match status {
            PrintJobStatus::Created => self.created += 1,
            PrintJobStatus::ImageReceived => self.image_received += 1,
            PrintJobStatus::Completed => self.completed += 1,
            PrintJobStatus::Failed => self.failed += 1,
        }
    }

    pub fn get(&self, status: PrintJobStatus) -> usize {
        match status {
            PrintJobStatus::Created => self.created,
            PrintJobStatus::ImageReceived => self.image_received,
            PrintJobStatus::Completed => self.completed,
            PrintJobStatus::Failed => self.failed,
        }
    }
}

pub fn validate_paging(page: usize, page_size: usize) -> Result<()> {
    if page < 1 {
        return Err(PacsError::InvalidArgument(format!("page must be at least 1, got {}", page)));
    }
    if page_size < 1 {
        return Err(PacsError::InvalidArgument(format!(
            "page size must be at least 1, got {}",
            page_size
        )));
    }
    Ok(())
}

/// 对任务快照执行一次查询，只克隆当前页的记录
pub fn query_jobs<'a>(
    jobs: impl IntoIterator<Item = &'a PrintJob>,
    filter: &PrintJobFilter,
    page: usize,
    page_size: usize,
) -> Result<Page<PrintJob>> {
    validate_paging(page, page_size)?;

    let mut matched: Vec<&PrintJob> = jobs.into_iter().filter(|job| filter.matches(job)).collect();
    matched.sort_by(|a, b| {
        b.create_time
            .cmp(&a.create_time)
            .then_with(|| a.job_id.cmp(&b.job_id))
    });

    let total = matched.len();
    let items = matched
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    Ok(Page {
        items,
        total,
        total_pages: total.div_ceil(page_size),
        page,
        page_size,
    })
}

pub fn count_statuses<'a>(jobs: impl IntoIterator<Item = &'a PrintJob>, filter: &PrintJobFilter) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for job in jobs.into_iter().filter(|job| filter.matches(job)) {
        counts.record(job.status);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pacs_core::{JobId, PrintJobRequest};
    use std::collections::HashSet;

    fn job(calling_ae: &str, study: Option<&str>, status: PrintJobStatus, create_time: DateTime<Utc>) -> PrintJob {
        let validated = PrintJobRequest {
            calling_ae: calling_ae.to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        PrintJob {
            job_id: JobId::new(),
            calling_ae: validated.calling_ae,
            study_instance_uid: study.map(str::to_string),
            film_session: validated.film_session,
            film_box: validated.film_box,
            status,
            error_message: None,
            image_path: None,
            printer_name: None,
            create_time,
            update_time: create_time,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
    }

    fn sample() -> Vec<PrintJob> {
        let t = base_time();
        vec![
            job("CT_SCANNER", Some("1.2.1"), PrintJobStatus::Created, t),
            job("ct_console", Some("1.2.2"), PrintJobStatus::Completed, t + Duration::hours(1)),
            job("MR_SCANNER", Some("1.2.1"), PrintJobStatus::Failed, t + Duration::days(1)),
            job("US_ROOM", None, PrintJobStatus::Created, t + Duration::days(2)),
            job("CT_SCANNER", Some("1.2.3"), PrintJobStatus::ImageReceived, t + Duration::days(2)),
        ]
    }

    #[test]
    fn test_calling_ae_is_case_insensitive_substring() {
        let jobs = sample();
        let filter = PrintJobFilter {
            calling_ae: Some("Ct_".to_string()),
            ..Default::default()
        };
        let page = query_jobs(&jobs, &filter, 1, 10).unwrap();
        assert_eq!(page.total, 3);
        assert!(page.items.iter().all(|job| job.calling_ae.to_lowercase().contains("ct_")));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let jobs = sample();
        let filter = PrintJobFilter {
            calling_ae: Some("scanner".to_string()),
            study_uid: Some("1.2.1".to_string()),
            status: Some(PrintJobStatus::Failed),
            date_on_or_after: None,
        };
        let page = query_jobs(&jobs, &filter, 1, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].calling_ae, "MR_SCANNER");

        let filter = PrintJobFilter {
            date_on_or_after: Some(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()),
            ..Default::default()
        };
        assert_eq!(query_jobs(&jobs, &filter, 1, 10).unwrap().total, 3);
    }

    #[test]
    fn test_blank_filter_values_are_ignored() {
        let jobs = sample();
        let filter = PrintJobFilter {
            calling_ae: Some("  ".to_string()),
            study_uid: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(query_jobs(&jobs, &filter, 1, 10).unwrap().total, jobs.len());
    }

    #[test]
    fn test_sort_order_and_tie_break() {
        let jobs = sample();
        let page = query_jobs(&jobs, &PrintJobFilter::default(), 1, 10).unwrap();

        for pair in page.items.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.create_time > b.create_time || (a.create_time == b.create_time && a.job_id < b.job_id));
        }
    }

    #[test]
    fn test_pagination_covers_every_match_once() {
        let t = base_time();
        let jobs: Vec<PrintJob> = (0..23)
            .map(|i| job("CT_SCANNER", None, PrintJobStatus::Created, t + Duration::minutes(i % 5)))
            .collect();

        let first = query_jobs(&jobs, &PrintJobFilter::default(), 1, 5).unwrap();
        assert_eq!(first.total, 23);
        assert_eq!(first.total_pages, 5);

        let mut seen = HashSet::new();
        for page in 1..=first.total_pages {
            let result = query_jobs(&jobs, &PrintJobFilter::default(), page, 5).unwrap();
            assert_eq!(result, query_jobs(jobs.iter().rev(), &PrintJobFilter::default(), page, 5).unwrap());
            for item in result.items {
                assert!(seen.insert(item.job_id));
            }
        }
        assert_eq!(seen.len(), 23);
    }

    #[test]
    fn test_page_past_end_is_empty_with_totals() {
        let jobs = sample();
        let page = query_jobs(&jobs, &PrintJobFilter::default(), 9, 2).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 9);
    }

    #[test]
    fn test_invalid_paging_arguments() {
        let jobs = sample();
        assert!(matches!(
            query_jobs(&jobs, &PrintJobFilter::default(), 0, 10),
            Err(PacsError::InvalidArgument(_))
        ));
        assert!(matches!(
            query_jobs(&jobs, &PrintJobFilter::default(), 1, 0),
            Err(PacsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_status_counts_cover_all_matches() {
        let jobs = sample();
        let counts = count_statuses(&jobs, &PrintJobFilter::default());
        assert_eq!(counts.total, 5);
        assert_eq!(counts.get(PrintJobStatus::Created), 2);
        assert_eq!(counts.image_received, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);

        let filter = PrintJobFilter {
            calling_ae: Some("ct".to_string()),
            ..Default::default()
        };
        assert_eq!(count_statuses(&jobs, &filter).total, 3);
    }
}
