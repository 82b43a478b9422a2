// ==========================================
// 考试成绩批量对账系统 - 对账流程错误类型
// ==========================================
// 范围: 致命错误（在任何成绩写入之前终止整个流程）
// 单元格级错误只进入报告，见 domain::marks::CellError
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 对账流程致命错误
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// 上游（排程/报名/考试目录）不可达
    #[error("上游服务不可用 ({source_name}): {detail}")]
    UpstreamUnavailable { source_name: String, detail: String },

    #[error("考试场次不存在: exam_event_id={0}")]
    ExamEventNotFound(i64),

    #[error("科目排程不存在: exam_event_id={exam_event_id}, schedule_id={schedule_id}")]
    ScheduleNotFound { exam_event_id: i64, schedule_id: i64 },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    File(#[from] ImportError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReconcileError {
    /// 将仓储错误包装为上游不可用
    pub fn upstream(source_name: &str, err: RepositoryError) -> Self {
        ReconcileError::UpstreamUnavailable {
            source_name: source_name.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type ReconcileResult<T> = Result<T, ReconcileError>;
