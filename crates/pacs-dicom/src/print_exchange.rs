//! 打印交换计划
//!
//! 描述一次 Basic Print Management 交换中 DIMSE-N 消息的顺序，不涉及PDU编码。

use crate::sop_classes::{self, BASIC_FILM_BOX, BASIC_FILM_SESSION};
use pacs_core::{FilmBox, FilmSession, PacsError, Result};
use serde::Serialize;
use std::fmt;

/// DIMSE-N 命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NCommand {
    NGet,
    NSet,
    NAction,
    NCreate,
    NDelete,
}

impl NCommand {
    /// 命令字段 (0000,0100) 的请求值
    pub fn command_field(&self) -> u16 {
        match self {
            NCommand::NGet => 0x0110,
            NCommand::NSet => 0x0120,
            NCommand::NAction => 0x0130,
            NCommand::NCreate => 0x0140,
            NCommand::NDelete => 0x0150,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NCommand::NGet => "N-GET",
            NCommand::NSet => "N-SET",
            NCommand::NAction => "N-ACTION",
            NCommand::NCreate => "N-CREATE",
            NCommand::NDelete => "N-DELETE",
        }
    }
}

impl fmt::Display for NCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交换中的一步
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStep {
    pub command: NCommand,
    pub sop_class_uid: &'static str,
    pub detail: String,
}

/// 一次打印交换的完整计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintExchangePlan {
    pub meta_sop_class_uid: &'static str,
    pub image_box_sop_class_uid: &'static str,
    /// 胶片上的图像框数量
    pub image_box_count: u32,
    /// 实际放入图像的图像框数量
    pub filled_image_boxes: u32,
    pub steps: Vec<ExchangeStep>,
}

impl PrintExchangePlan {
    pub fn build(film_session: &FilmSession, film_box: &FilmBox, image_count: usize) -> Result<Self> {
        let (meta_sop_class_uid, image_box_sop_class_uid) =
            sop_classes::print_management_classes(film_box.print_in_color);
        let image_box_count = image_box_count(&film_box.image_display_format)?;
        let filled_image_boxes = image_box_count.min(u32::try_from(image_count).unwrap_or(u32::MAX));

        let mut steps = Vec::with_capacity(filled_image_boxes as usize + 4);
        steps.push(ExchangeStep {
            command: NCommand::NCreate,
            sop_class_uid: BASIC_FILM_SESSION,
            detail: format!(
                "copies={} priority={} medium={} destination={}",
                film_session.number_of_copies,
                film_session.print_priority.as_dicom(),
                film_session.medium_type,
                film_session.film_destination
            ),
        });
        steps.push(ExchangeStep {
            command: NCommand::NCreate,
            sop_class_uid: BASIC_FILM_BOX,
            detail: format!(
                "format={} orientation={} size={} magnification={} density={}..{}",
                film_box.image_display_format,
                film_box.film_orientation.as_dicom(),
                film_box.film_size_id,
                film_box.magnification_type,
                film_box.min_density,
                film_box.max_density
            ),
        });
        for position in 1..=filled_image_boxes {
            steps.push(ExchangeStep {
                command: NCommand::NSet,
                sop_class_uid: image_box_sop_class_uid,
                detail: format!("image position {}", position),
            });
        }
        steps.push(ExchangeStep {
            command: NCommand::NAction,
            sop_class_uid: BASIC_FILM_BOX,
            detail: "print film box".to_string(),
        });
        steps.push(ExchangeStep {
            command: NCommand::NDelete,
            sop_class_uid: BASIC_FILM_SESSION,
            detail: "release film session".to_string(),
        });

        Ok(Self {
            meta_sop_class_uid,
            image_box_sop_class_uid,
            image_box_count,
            filled_image_boxes,
            steps,
        })
    }
}

/// 由 Image Display Format (2010,0010) 推导图像框数量
///
/// `STANDARD\C,R` 为 C×R；`ROW\a,b,...` 与 `COL\a,b,...` 为各行/列之和。
pub fn image_box_count(image_display_format: &str) -> Result<u32> {
    let invalid = || PacsError::InvalidArgument(format!("unsupported image display format '{}'", image_display_format));

    let (kind, params) = image_display_format.trim().split_once('\\').ok_or_else(invalid)?;
    let values = params
        .split(',')
        .map(|v| v.trim().parse::<u32>().ok().filter(|n| *n > 0))
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(invalid)?;

    match kind.trim().to_ascii_uppercase().as_str() {
        "STANDARD" if values.len() == 2 => values[0].checked_mul(values[1]).ok_or_else(invalid),
        "ROW" | "COL" if !values.is_empty() => values
            .iter()
            .try_fold(0u32, |sum, n| sum.checked_add(*n))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}
