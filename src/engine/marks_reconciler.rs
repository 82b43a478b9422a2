// ==========================================
// 考试成绩批量对账系统 - 成绩对账引擎
// ==========================================
// 职责: MarksCell × 花名册索引 → 写入计划 + 拒绝列表
// 规则:
// 1. (学号, 科目代码) 不在花名册 → NotEnrolled（不发起任何写入）
// 2. 成绩 > 满分 → MarksOutOfRange
// 3. 其余单元格生成幂等写入指令
// ==========================================

use crate::domain::marks::{CellError, MarksCell, MarksUpsertRequest, Rejection};
use crate::domain::roster::RosterIndex;
use tracing::debug;

// ==========================================
// PlannedUpsert - 待派发的写入
// ==========================================
// 保留来源单元格位置，写入失败时用于报告定位
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpsert {
    pub row: usize,
    pub column: usize,
    pub roll_number: String,
    pub subject_code: String,
    pub request: MarksUpsertRequest,
}

impl PlannedUpsert {
    /// 幂等键 (schedule_id, student_id)
    pub fn key(&self) -> (i64, i64) {
        (self.request.schedule_id, self.request.student_id)
    }
}

/// 对账结果
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub planned: Vec<PlannedUpsert>,
    pub rejected: Vec<Rejection>,
}

// ==========================================
// MarksReconciler
// ==========================================
pub struct MarksReconciler;

impl MarksReconciler {
    /// 逐个单元格校验资格与分数范围
    ///
    /// 输出的 planned 保持输入单元格顺序（即行序）
    pub fn reconcile(
        &self,
        cells: &[MarksCell],
        index: &RosterIndex,
        submitted_by: &str,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        for cell in cells {
            let Some(slot) = index.lookup(&cell.roll_number, &cell.subject_code) else {
                debug!(
                    row = cell.row,
                    roll_number = %cell.roll_number,
                    subject_code = %cell.subject_code,
                    "未报考，跳过"
                );
                outcome.rejected.push(Rejection {
                    row: cell.row,
                    column: Some(cell.column),
                    subject_code: Some(cell.subject_code.clone()),
                    reason: CellError::NotEnrolled {
                        roll_number: cell.roll_number.clone(),
                        subject_code: cell.subject_code.clone(),
                    },
                });
                continue;
            };

            if cell.marks > f64::from(slot.max_marks) {
                outcome.rejected.push(Rejection {
                    row: cell.row,
                    column: Some(cell.column),
                    subject_code: Some(cell.subject_code.clone()),
                    reason: CellError::MarksOutOfRange {
                        roll_number: cell.roll_number.clone(),
                        subject_code: cell.subject_code.clone(),
                        value: cell.marks,
                        max_marks: slot.max_marks,
                    },
                });
                continue;
            }

            outcome.planned.push(PlannedUpsert {
                row: cell.row,
                column: cell.column,
                roll_number: cell.roll_number.clone(),
                subject_code: cell.subject_code.clone(),
                request: MarksUpsertRequest {
                    schedule_id: slot.schedule_id,
                    student_id: slot.student_id,
                    marks: cell.marks,
                    submitted_by: submitted_by.to_string(),
                },
            });
        }

        outcome
    }
}
