// ==========================================
// 考试成绩批量对账系统 - API 层
// ==========================================
// 职责: 提供面向调用方（CLI / 上层服务）的业务接口
// ==========================================

pub mod error;
pub mod marks_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use marks_api::{MarksApi, TemplateExportResponse};
