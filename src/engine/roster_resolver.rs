// ==========================================
// 考试成绩批量对账系统 - 花名册解析引擎
// ==========================================
// 职责: 已通过报名 × 科目排程 → RosterEntry 序列
// 红线: 排程读取失败为致命错误（无花名册即无安全对账）
// 红线: 单条申请数据异常只记录跳过，不中断整个解析
// ==========================================
// 去重规则:
// - 同一学号多条已通过申请 → 取最小申请ID的 student_id 作为规范学生
// - 同一 (student, schedule) 多条 → 保留最小申请ID
// 输出顺序: roll_number 升序，再 subject_code 升序
// ==========================================

use crate::domain::exam::{EnrollmentApplication, SubjectSchedule};
use crate::domain::roster::{Roster, RosterEntry, RosterWarning};
use crate::domain::types::ApplicationStatus;
use crate::engine::error::{ReconcileError, ReconcileResult};
use crate::repository::ExamCatalogRepository;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ==========================================
// RosterResolver - 花名册解析器
// ==========================================
pub struct RosterResolver {
    catalog: Arc<dyn ExamCatalogRepository>,
}

impl RosterResolver {
    pub fn new(catalog: Arc<dyn ExamCatalogRepository>) -> Self {
        Self { catalog }
    }

    /// 解析指定考试场次的花名册
    ///
    /// # 返回
    /// - Ok(Roster): 花名册（含告警）
    /// - Err(UpstreamUnavailable): 排程或申请读取失败
    #[instrument(skip(self))]
    pub async fn resolve(&self, exam_event_id: i64) -> ReconcileResult<Roster> {
        // 两次上游读取相互独立，并发发起
        let (schedules, applications) = futures::try_join!(
            async {
                self.catalog
                    .list_schedules(exam_event_id)
                    .await
                    .map_err(|e| ReconcileError::upstream("科目排程", e))
            },
            async {
                self.catalog
                    .list_applications(exam_event_id, ApplicationStatus::Approved)
                    .await
                    .map_err(|e| ReconcileError::upstream("报名申请", e))
            },
        )?;

        let roster = build_roster(exam_event_id, schedules, applications);

        info!(
            exam_event_id,
            schedules = roster.schedules.len(),
            entries = roster.entries.len(),
            students = roster.student_count(),
            warnings = roster.warnings.len(),
            "花名册解析完成"
        );

        Ok(roster)
    }
}

/// 由排程与申请构建花名册（纯函数，无 I/O）
pub fn build_roster(
    exam_event_id: i64,
    mut schedules: Vec<SubjectSchedule>,
    mut applications: Vec<EnrollmentApplication>,
) -> Roster {
    let mut warnings = Vec::new();

    schedules.sort_by_key(|s| s.id);
    applications.sort_by_key(|a| a.id);

    // === 科目代码唯一性（同代码只保留最小排程ID）===
    let mut code_owner: HashMap<&str, i64> = HashMap::new();
    let mut shadowed_schedules: HashSet<i64> = HashSet::new();
    let mut shadowed_subjects: HashSet<i64> = HashSet::new();
    for schedule in &schedules {
        match code_owner.get(schedule.subject_code.as_str()) {
            Some(&kept) => {
                warn!(
                    subject_code = %schedule.subject_code,
                    kept_schedule_id = kept,
                    ignored_schedule_id = schedule.id,
                    "同一场次存在重复科目代码"
                );
                warnings.push(RosterWarning::DuplicateSubjectCode {
                    subject_code: schedule.subject_code.clone(),
                    kept_schedule_id: kept,
                    ignored_schedule_id: schedule.id,
                });
                shadowed_schedules.insert(schedule.id);
                shadowed_subjects.insert(schedule.subject_id);
            }
            None => {
                code_owner.insert(schedule.subject_code.as_str(), schedule.id);
            }
        }
    }

    let schedule_by_subject: HashMap<i64, &SubjectSchedule> = schedules
        .iter()
        .filter(|s| !shadowed_schedules.contains(&s.id))
        .map(|s| (s.subject_id, s))
        .collect();

    // === 同学号申请归并（已按申请ID升序，首个即规范申请）===
    let mut canonical_by_roll: HashMap<&str, &EnrollmentApplication> = HashMap::new();
    let mut merged_by_roll: BTreeMap<&str, Vec<i64>> = BTreeMap::new();

    // (student_id, schedule_id) → RosterEntry
    let mut entries: HashMap<(i64, i64), RosterEntry> = HashMap::new();

    for app in &applications {
        // 上游过滤不可信，这里再次确认状态
        if app.status != ApplicationStatus::Approved {
            continue;
        }

        let subject_ids = match app.parse_subject_ids() {
            Ok(ids) => ids,
            Err(detail) => {
                warn!(application_id = app.id, detail = %detail, "报名申请数据异常，已跳过");
                warnings.push(RosterWarning::MalformedApplicationData {
                    application_id: app.id,
                    detail,
                });
                continue;
            }
        };

        let canonical = *canonical_by_roll
            .entry(app.roll_number.as_str())
            .or_insert(app);
        if canonical.id != app.id {
            merged_by_roll
                .entry(app.roll_number.as_str())
                .or_default()
                .push(app.id);
        }

        for subject_id in subject_ids {
            let Some(schedule) = schedule_by_subject.get(&subject_id) else {
                // 被重复代码遮蔽的排程已单独告警
                if shadowed_subjects.contains(&subject_id) {
                    continue;
                }
                warnings.push(RosterWarning::UnscheduledSubject {
                    application_id: app.id,
                    subject_id,
                });
                continue;
            };

            // 申请已按ID升序遍历，先到者即最小申请ID
            entries
                .entry((canonical.student_id, schedule.id))
                .or_insert_with(|| RosterEntry {
                    student_id: canonical.student_id,
                    roll_number: canonical.roll_number.clone(),
                    student_name: canonical.student_name.clone(),
                    schedule_id: schedule.id,
                    subject_code: schedule.subject_code.clone(),
                    max_marks: schedule.max_marks,
                    application_id: app.id,
                });
        }
    }

    for (roll_number, merged) in merged_by_roll {
        let kept = canonical_by_roll
            .get(roll_number)
            .map(|a| a.id)
            .unwrap_or_default();
        warn!(
            roll_number,
            kept_application_id = kept,
            merged_application_ids = ?merged,
            "同一学号存在多条已通过申请，按最小申请ID归并"
        );
        warnings.push(RosterWarning::DuplicateRollNumber {
            roll_number: roll_number.to_string(),
            kept_application_id: kept,
            merged_application_ids: merged,
        });
    }

    let mut entries: Vec<RosterEntry> = entries.into_values().collect();
    entries.sort_by(|a, b| {
        a.roll_number
            .cmp(&b.roll_number)
            .then_with(|| a.subject_code.cmp(&b.subject_code))
    });

    Roster {
        exam_event_id,
        schedules,
        entries,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(id: i64, subject_id: i64, code: &str, max: i32) -> SubjectSchedule {
        SubjectSchedule {
            id,
            exam_event_id: 1,
            subject_id,
            subject_code: code.to_string(),
            subject_name: format!("Subject {}", code),
            max_marks: max,
        }
    }

    fn app(id: i64, student_id: i64, roll: &str, subjects: &str) -> EnrollmentApplication {
        EnrollmentApplication {
            id,
            exam_event_id: 1,
            student_id,
            roll_number: roll.to_string(),
            student_name: format!("Student {}", student_id),
            department: "CSE".to_string(),
            semester: 3,
            selected_subjects: subjects.to_string(),
            status: ApplicationStatus::Approved,
        }
    }

    #[test]
    fn test_intersection_and_order() {
        let roster = build_roster(
            1,
            vec![schedule(2, 102, "CS102", 80), schedule(1, 101, "CS101", 50)],
            vec![
                app(11, 200, "21CS002", "[101]"),
                app(10, 100, "21CS001", "[102, 101]"),
            ],
        );

        let keys: Vec<(&str, &str)> = roster
            .entries
            .iter()
            .map(|e| (e.roll_number.as_str(), e.subject_code.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("21CS001", "CS101"), ("21CS001", "CS102"), ("21CS002", "CS101")]
        );
        assert_eq!(roster.schedules[0].id, 1);
        assert!(roster.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_roll_number_binds_lowest_application() {
        let roster = build_roster(
            1,
            vec![schedule(1, 101, "CS101", 50)],
            vec![
                app(8, 300, "21CS001", "[101]"),
                app(5, 100, "21CS001", "[101]"),
            ],
        );

        assert_eq!(roster.entries.len(), 1);
        assert_eq!(roster.entries[0].student_id, 100);
        assert_eq!(roster.entries[0].application_id, 5);
        assert!(roster.warnings.iter().any(|w| matches!(
            w,
            RosterWarning::DuplicateRollNumber { kept_application_id: 5, merged_application_ids, .. }
                if merged_application_ids == &vec![8]
        )));
    }

    #[test]
    fn test_malformed_application_skipped() {
        let roster = build_roster(
            1,
            vec![schedule(1, 101, "CS101", 50)],
            vec![
                app(1, 100, "21CS001", "not json"),
                app(2, 200, "21CS002", "[101, 101]"),
                app(3, 300, "21CS003", "[101]"),
            ],
        );

        assert_eq!(roster.entries.len(), 1);
        assert_eq!(roster.entries[0].roll_number, "21CS003");
        let malformed = roster
            .warnings
            .iter()
            .filter(|w| matches!(w, RosterWarning::MalformedApplicationData { .. }))
            .count();
        assert_eq!(malformed, 2);
    }

    #[test]
    fn test_unscheduled_subject_and_non_approved_ignored() {
        let mut pending = app(4, 400, "21CS004", "[101]");
        pending.status = ApplicationStatus::Pending;

        let roster = build_roster(
            1,
            vec![schedule(1, 101, "CS101", 50)],
            vec![app(1, 100, "21CS001", "[101, 999]"), pending],
        );

        assert_eq!(roster.entries.len(), 1);
        assert!(roster.warnings.contains(&RosterWarning::UnscheduledSubject {
            application_id: 1,
            subject_id: 999
        }));
    }

    #[test]
    fn test_duplicate_subject_code_keeps_lowest_schedule() {
        let roster = build_roster(
            1,
            vec![schedule(1, 101, "CS101", 50), schedule(2, 102, "CS101", 80)],
            vec![app(1, 100, "21CS001", "[101, 102]")],
        );

        assert_eq!(roster.entries.len(), 1);
        assert_eq!(roster.entries[0].schedule_id, 1);
        assert!(roster
            .warnings
            .iter()
            .any(|w| matches!(w, RosterWarning::DuplicateSubjectCode { ignored_schedule_id: 2, .. })));
    }
}
