// ==========================================
// 考试成绩批量对账系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、派生结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod exam;
pub mod marks;
pub mod roster;
pub mod types;

// 重导出核心类型
pub use exam::{EnrollmentApplication, ExamEvent, SubjectSchedule};
pub use marks::{
    CellError, MarksCell, MarksRecord, MarksUpsertRequest, ReconciliationReport, Rejection,
};
pub use roster::{Roster, RosterEntry, RosterIndex, RosterSlot, RosterWarning};
pub use types::{ApplicationStatus, UpsertDisposition};
