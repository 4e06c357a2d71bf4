//! 空运行传输：只记录交换计划，不连接打印机

use crate::print_exchange::PrintExchangePlan;
use crate::print_scu::{ImageSource, PrintTransport, TransportOutcome};
use async_trait::async_trait;
use pacs_core::{FilmBox, FilmSession, PrinterTarget};
use tracing::{debug, info, warn};

/// 未接入网络SCU时使用的传输实现
#[derive(Debug, Clone, Default)]
pub struct DryRunTransport;

impl DryRunTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PrintTransport for DryRunTransport {
    async fn attempt_print(
        &self,
        target: &PrinterTarget,
        film_session: &FilmSession,
        film_box: &FilmBox,
        image_source: &ImageSource,
    ) -> TransportOutcome {
        let study = image_source.study_instance_uid.as_deref().unwrap_or("<none>");
        if image_source.is_empty() {
            warn!("No source images resolved for study {} on printer {}", study, target.printer_name);
            return TransportOutcome::failed(format!("no source images resolved for study {}", study));
        }

        let plan = match PrintExchangePlan::build(film_session, film_box, image_source.file_paths.len()) {
            Ok(plan) => plan,
            Err(e) => return TransportOutcome::failed(e.to_string()),
        };

        info!(
            "Dry-run print of study {} to {} ({}@{}:{}): {} steps, {}/{} image boxes",
            study,
            target.printer_name,
            target.called_ae_title,
            target.host,
            target.port,
            plan.steps.len(),
            plan.filled_image_boxes,
            plan.image_box_count
        );
        for step in &plan.steps {
            debug!("  {} {} {}", step.command, step.sop_class_uid, step.detail);
        }

        TransportOutcome::succeeded(image_source.file_paths.first().cloned())
    }
}
