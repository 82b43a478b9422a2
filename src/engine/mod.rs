// ==========================================
// 考试成绩批量对账系统 - 引擎层
// ==========================================
// 职责: 花名册解析、模板生成、成绩对账、写入派发、报告汇总
// 红线: Engine 不拼 SQL，所有拒绝必须带 reason
// ==========================================

pub mod error;
pub mod marks_import_service;
pub mod marks_reconciler;
pub mod roster_resolver;
pub mod submission_reporter;
pub mod template_generator;
pub mod upsert_dispatcher;

// 重导出核心引擎
pub use error::{ReconcileError, ReconcileResult};
pub use marks_import_service::{MarksImportService, SubjectMarksRow, TemplateExport};
pub use marks_reconciler::{MarksReconciler, PlannedUpsert, ReconcileOutcome};
pub use roster_resolver::{build_roster, RosterResolver};
pub use submission_reporter::SubmissionReporter;
pub use template_generator::{MarksTemplate, TemplateGenerator};
pub use upsert_dispatcher::{CancelFlag, DispatchOptions, DispatchOutcome, UpsertDispatcher};
