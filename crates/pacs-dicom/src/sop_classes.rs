//! 打印管理服务类使用的SOP类UID (PS3.4 Annex H)

/// Basic Film Session SOP Class
pub const BASIC_FILM_SESSION: &str = "1.2.840.10008.5.1.1.1";
/// Basic Film Box SOP Class
pub const BASIC_FILM_BOX: &str = "1.2.840.10008.5.1.1.2";
/// Basic Grayscale Image Box SOP Class
pub const BASIC_GRAYSCALE_IMAGE_BOX: &str = "1.2.840.10008.5.1.1.4";
/// Basic Color Image Box SOP Class
pub const BASIC_COLOR_IMAGE_BOX: &str = "1.2.840.10008.5.1.1.4.1";
/// Basic Grayscale Print Management Meta SOP Class
pub const BASIC_GRAYSCALE_PRINT_MANAGEMENT_META: &str = "1.2.840.10008.5.1.1.9";
/// Basic Color Print Management Meta SOP Class
pub const BASIC_COLOR_PRINT_MANAGEMENT_META: &str = "1.2.840.10008.5.1.1.18";
/// Printer SOP Class
pub const PRINTER: &str = "1.2.840.10008.5.1.1.16";
/// Printer SOP Instance (well-known)
pub const PRINTER_INSTANCE: &str = "1.2.840.10008.5.1.1.17";

/// 根据是否彩色打印选择元SOP类与图像框SOP类
pub fn print_management_classes(print_in_color: bool) -> (&'static str, &'static str) {
    if print_in_color {
        (BASIC_COLOR_PRINT_MANAGEMENT_META, BASIC_COLOR_IMAGE_BOX)
    } else {
        (BASIC_GRAYSCALE_PRINT_MANAGEMENT_META, BASIC_GRAYSCALE_IMAGE_BOX)
    }
}
