// ==========================================
// 考试成绩批量对账系统 - 成绩领域模型
// ==========================================
// MarksCell: 导入中间结构（解析 → 对账 → 丢弃）
// MarksUpsertRequest: 发往持久化服务的幂等写入指令
// ReconciliationReport: 每次导入新建，直接返回调用方，不落库
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// MarksCell - 成绩单元格
// ==========================================
// 行号口径: 表头=1，首个数据行=2（与表格软件一致）
// 列号口径: 0 起（0=学号，1=姓名，>=2 科目列）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarksCell {
    pub row: usize,
    pub column: usize,
    pub roll_number: String,
    pub subject_code: String,
    pub raw: String,
    pub marks: f64, // 解析后的数值（非负有限）
}

// ==========================================
// MarksUpsertRequest - 成绩写入指令
// ==========================================
// 幂等键: (schedule_id, student_id)，重复提交以最后一次为准
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarksUpsertRequest {
    pub schedule_id: i64,
    pub student_id: i64,
    pub marks: f64,
    pub submitted_by: String,
}

// ==========================================
// MarksRecord - 已落库成绩记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarksRecord {
    pub id: i64,
    pub schedule_id: i64,
    pub student_id: i64,
    pub marks_obtained: f64,
    pub marks_entered_by: Option<String>,
    pub marks_entered_at: Option<DateTime<Utc>>,
}

// ==========================================
// CellError - 行/单元格级错误
// ==========================================
// 红线: 只记录、跳过，绝不中断同批次其他单元格
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellError {
    #[error("文件为空: 至少需要表头和一行数据")]
    EmptyInput,

    #[error("表头无法识别科目代码 (列 {column}): {header}")]
    MalformedHeader { column: usize, header: String },

    #[error("学号缺失 (行 {row})")]
    MissingRollNumber { row: usize },

    #[error("成绩值非法 (行 {row}, 列 {column}): {raw}")]
    InvalidMarksValue { row: usize, column: usize, raw: String },

    #[error("学生未报考该科目: roll_number={roll_number}, subject_code={subject_code}")]
    NotEnrolled {
        roll_number: String,
        subject_code: String,
    },

    #[error("成绩超出满分: roll_number={roll_number}, subject_code={subject_code}, 值 {value} > {max_marks}")]
    MarksOutOfRange {
        roll_number: String,
        subject_code: String,
        value: f64,
        max_marks: i32,
    },

    #[error("成绩写入失败: roll_number={roll_number}, subject_code={subject_code}: {detail}")]
    PersistenceFailure {
        roll_number: String,
        subject_code: String,
        detail: String,
    },
}

// ==========================================
// Rejection - 报告中的拒绝条目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rejection {
    pub row: usize,
    pub column: Option<usize>,
    pub subject_code: Option<String>,
    pub reason: CellError,
}

// ==========================================
// ReconciliationReport - 对账报告
// ==========================================
// 策略: 尽力而为、完全可观测；已写入的成绩永不回滚
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub import_id: String,
    pub exam_event_id: i64,
    pub total_cells: usize,    // 科目列中见到的单元格总数（含哨兵值）
    pub skipped_cells: usize,  // 空 / NA / 0 哨兵跳过数
    pub accepted: usize,       // 成功写入数
    pub not_dispatched: usize, // 因取消而未派发的写入数
    pub cancelled: bool,
    pub rejected: Vec<Rejection>,
    pub roster_warnings: Vec<crate::domain::roster::RosterWarning>,
    pub elapsed_ms: u64,
}

impl ReconciliationReport {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    /// 是否存在任意单元格级失败（部分成功）
    pub fn is_partial(&self) -> bool {
        !self.rejected.is_empty() || self.cancelled
    }
}
