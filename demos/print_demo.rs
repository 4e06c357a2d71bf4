//! 打印工作流演示程序
//!
//! 归档一个检查、注册打印机、创建打印任务并派发，最后按条件查询与统计。

use chrono::NaiveDate;
use pacs_print::archive::{ArchiveIndex, NewInstance, NewSeries, NewStudy};
use pacs_print::core::utils::generate_dicom_uid;
use pacs_print::core::Demographics;
use pacs_print::dicom::DryRunTransport;
use pacs_print::{DispatchConfig, PrintJobFilter, PrintJobRequest, PrintJobStatus, PrintWorkflow, Printer};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🚀 PACS 胶片打印演示\n");

    // 1. 归档示例检查
    let archive = Arc::new(ArchiveIndex::new());
    let study_uid = generate_dicom_uid();
    for number in 1..=4 {
        archive
            .add_instance(
                NewStudy {
                    study_instance_uid: study_uid.clone(),
                    patient_id: "DEMO001".to_string(),
                    demographics: Demographics {
                        patient_name: Some("Zhang^San".to_string()),
                        ..Default::default()
                    },
                    study_date: NaiveDate::from_ymd_opt(2024, 5, 20),
                    modality: Some("CT".to_string()),
                    ..Default::default()
                },
                NewSeries {
                    series_instance_uid: format!("{}.1", study_uid),
                    series_number: Some(1),
                    ..Default::default()
                },
                NewInstance {
                    sop_instance_uid: format!("{}.1.{}", study_uid, number),
                    sop_class_uid: "1.2.840.10008.5.1.4.1.1.2".to_string(),
                    instance_number: Some(number),
                    file_path: format!("./data/dicom/{}/{}.dcm", study_uid, number),
                    ..Default::default()
                },
            )
            .await?;
    }
    let stats = archive.stats().await;
    println!("✅ 归档完成: {} 个检查, {} 个实例", stats.studies, stats.instances);

    // 2. 注册打印机
    let workflow = PrintWorkflow::new(archive, Arc::new(DryRunTransport::new()), DispatchConfig::default());
    workflow
        .load_printers(vec![
            Printer {
                name: "film-room-1".to_string(),
                ae_title: "DRYPIX_1".to_string(),
                host: "192.168.1.50".to_string(),
                port: 104,
                description: Some("一楼胶片室".to_string()),
                is_default: true,
            },
            Printer {
                name: "film-room-2".to_string(),
                ae_title: "DRYPIX_2".to_string(),
                host: "192.168.1.51".to_string(),
                port: 104,
                description: None,
                is_default: false,
            },
        ])
        .await?;
    for printer in workflow.list_printers().await {
        println!(
            "🖨️  {} ({}@{}:{}){}",
            printer.name,
            printer.ae_title,
            printer.host,
            printer.port,
            if printer.is_default { " [默认]" } else { "" }
        );
    }

    // 3. 创建打印任务：一个 2x2 版式，一个引用不存在的检查
    let good = workflow
        .create_print_job(PrintJobRequest {
            calling_ae: "CT_ROOM_1".to_string(),
            study_instance_uid: Some(study_uid.clone()),
            image_display_format: "STANDARD\\2,2".to_string(),
            ..Default::default()
        })
        .await?;
    let dangling = workflow
        .create_print_job(PrintJobRequest {
            calling_ae: "MR_ROOM_2".to_string(),
            study_instance_uid: Some(generate_dicom_uid()),
            ..Default::default()
        })
        .await?;
    println!("\n📋 已创建任务 {} 和 {}", good.job_id, dangling.job_id);

    match workflow
        .create_print_job(PrintJobRequest {
            calling_ae: "CT_ROOM_1".to_string(),
            number_of_copies: 0,
            ..Default::default()
        })
        .await
    {
        Ok(_) => println!("⚠️  非法任务竟被接受"),
        Err(e) => println!("🚫 非法任务被拒绝, 字段: {:?}", e.violated_fields()),
    }

    // 4. 派发并等待结果
    let first = workflow.dispatch_print_job(good.job_id, None).await?;
    let second = workflow.dispatch_print_job(dangling.job_id, Some("film-room-2")).await?;
    for ticket in [first, second] {
        let report = ticket.outcome().await?;
        println!(
            "   任务 {} @ {}: {:?} {}",
            report.job_id,
            report.printer_name,
            report.status,
            report.error_message.unwrap_or_default()
        );
    }

    // 5. 查询与统计
    let filter = PrintJobFilter {
        status: Some(PrintJobStatus::Completed),
        ..Default::default()
    };
    let page = workflow.list_print_jobs(&filter, 1, 10).await?;
    println!("\n📊 已完成任务 {} 个", page.total);
    for job in &page.items {
        println!(
            "   - {} {} 胶片 {} 打印机 {}",
            job.job_id,
            job.status.label(),
            job.film_box.image_display_format,
            job.printer_name.as_deref().unwrap_or("-")
        );
    }

    let counts = workflow.print_job_stats(&PrintJobFilter::default()).await;
    println!(
        "   总计 {}: 已创建 {}, 已接收 {}, 已完成 {}, 失败 {}",
        counts.total, counts.created, counts.image_received, counts.completed, counts.failed
    );

    workflow.shutdown().await;
    println!("\n🎉 演示完成");
    Ok(())
}
