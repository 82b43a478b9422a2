// ==========================================
// 考试成绩批量对账系统 - API层错误类型
// ==========================================
// 职责: 将 Repository / 对账流程错误转换为调用方可读的错误消息
// 约定: Err 只表示"什么都没发生"，部分成功通过报告返回
// ==========================================

use crate::engine::error::ReconcileError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("上游服务不可用: {0}")]
    UpstreamUnavailable(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Unavailable(msg) => ApiError::UpstreamUnavailable(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ReconcileError 转换
// ==========================================
impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            e @ ReconcileError::UpstreamUnavailable { .. } => {
                ApiError::UpstreamUnavailable(e.to_string())
            }
            e @ (ReconcileError::ExamEventNotFound(_) | ReconcileError::ScheduleNotFound { .. }) => {
                ApiError::NotFound(e.to_string())
            }
            ReconcileError::Config(msg) => ApiError::ConfigError(msg),
            ReconcileError::File(e) => ApiError::from(e),
            ReconcileError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件不存在: {}", path)),
            ImportError::UnsupportedFormat(ext) => {
                ApiError::InvalidInput(format!("文件格式不支持: {}", ext))
            }
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_error_conversion() {
        let err: ApiError = ReconcileError::ExamEventNotFound(9).into();
        assert!(matches!(err, ApiError::NotFound(msg) if msg.contains("9")));

        let err: ApiError =
            ReconcileError::upstream("科目排程", RepositoryError::Unavailable("timeout".into()))
                .into();
        assert!(matches!(err, ApiError::UpstreamUnavailable(msg) if msg.contains("timeout")));
    }

    #[test]
    fn test_import_error_conversion() {
        let err: ApiError = ReconcileError::File(ImportError::UnsupportedFormat("txt".into())).into();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
