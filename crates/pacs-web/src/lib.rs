//! PACS 打印 HTTP 接口

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, AppState, PrintAccepted, PrintByJobRequest, PrintJobQueryParams};
pub use server::{create_app, WebServer};
