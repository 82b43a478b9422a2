// ==========================================
// 考试成绩批量对账系统 - 提交报告汇总
// ==========================================
// 职责: 合并解析 / 对账 / 写入三阶段的结果为 ReconciliationReport
// 红线: 只汇总不回滚，已写入的成绩保持提交状态
// ==========================================

use crate::domain::marks::{CellError, ReconciliationReport, Rejection};
use crate::domain::roster::RosterWarning;
use crate::engine::upsert_dispatcher::DispatchOutcome;
use crate::importer::template_parser::ParsedTemplate;
use std::time::Instant;

// ==========================================
// SubmissionReporter
// ==========================================
pub struct SubmissionReporter {
    import_id: String,
    exam_event_id: i64,
    started_at: Instant,
}

impl SubmissionReporter {
    pub fn new(import_id: impl Into<String>, exam_event_id: i64) -> Self {
        Self {
            import_id: import_id.into(),
            exam_event_id,
            started_at: Instant::now(),
        }
    }

    pub fn import_id(&self) -> &str {
        &self.import_id
    }

    /// 汇总完整流程的结果
    pub fn finish(
        &self,
        parsed: ParsedTemplate,
        reconcile_rejected: Vec<Rejection>,
        dispatched: DispatchOutcome,
        roster_warnings: Vec<RosterWarning>,
    ) -> ReconciliationReport {
        let mut rejected = parsed.errors;
        rejected.extend(reconcile_rejected);
        rejected.extend(dispatched.failures);
        // 稳定排序：同一单元格先出现的阶段在前
        rejected.sort_by_key(|r| (r.row, r.column));

        ReconciliationReport {
            import_id: self.import_id.clone(),
            exam_event_id: self.exam_event_id,
            total_cells: parsed.total_cells,
            skipped_cells: parsed.skipped_cells,
            accepted: dispatched.accepted,
            not_dispatched: dispatched.not_dispatched,
            cancelled: dispatched.cancelled,
            rejected,
            roster_warnings,
            elapsed_ms: self.elapsed_ms(),
        }
    }

    /// 输入为空：不解析花名册、不写入
    pub fn empty_input(&self, reason: CellError) -> ReconciliationReport {
        ReconciliationReport {
            import_id: self.import_id.clone(),
            exam_event_id: self.exam_event_id,
            total_cells: 0,
            skipped_cells: 0,
            accepted: 0,
            not_dispatched: 0,
            cancelled: false,
            rejected: vec![Rejection {
                row: 0,
                column: None,
                subject_code: None,
                reason,
            }],
            roster_warnings: vec![],
            elapsed_ms: self.elapsed_ms(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejection(row: usize, column: usize, reason: CellError) -> Rejection {
        Rejection {
            row,
            column: Some(column),
            subject_code: Some("CS101".to_string()),
            reason,
        }
    }

    #[test]
    fn test_finish_merges_and_orders_rejections() {
        let parsed = ParsedTemplate {
            total_cells: 6,
            skipped_cells: 2,
            errors: vec![rejection(
                4,
                2,
                CellError::InvalidMarksValue {
                    row: 4,
                    column: 2,
                    raw: "x".to_string(),
                },
            )],
            ..Default::default()
        };
        let not_enrolled = rejection(
            3,
            3,
            CellError::NotEnrolled {
                roll_number: "21CS002".to_string(),
                subject_code: "CS102".to_string(),
            },
        );
        let dispatched = DispatchOutcome {
            accepted: 2,
            failures: vec![rejection(
                2,
                2,
                CellError::PersistenceFailure {
                    roll_number: "21CS001".to_string(),
                    subject_code: "CS101".to_string(),
                    detail: "down".to_string(),
                },
            )],
            ..Default::default()
        };

        let report = SubmissionReporter::new("imp-1", 7).finish(
            parsed,
            vec![not_enrolled],
            dispatched,
            vec![],
        );

        assert_eq!(report.exam_event_id, 7);
        assert_eq!(report.total_cells, 6);
        assert_eq!(report.skipped_cells, 2);
        assert_eq!(report.accepted, 2);
        let rows: Vec<usize> = report.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert!(report.is_partial());
    }

    #[test]
    fn test_empty_input_report() {
        let report = SubmissionReporter::new("imp-2", 1).empty_input(CellError::EmptyInput);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.rejected_count(), 1);
        assert_eq!(report.rejected[0].row, 0);
        assert_eq!(report.rejected[0].reason, CellError::EmptyInput);
    }
}
