// ==========================================
// 考试成绩批量对账系统 - 考试领域模型
// ==========================================
// 数据来源: 外部考试排程/报名服务（只读）
// 红线: 对账过程中视为不可变
// ==========================================

use crate::domain::types::ApplicationStatus;
use serde::{Deserialize, Serialize};

// ==========================================
// ExamEvent - 考试场次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExamEvent {
    pub id: i64,
    pub name: String,          // 如 "Second Year Mid-Term Exams, Winter 2025"
    pub department: String,    // 院系
    pub semester: i32,         // 学期
    pub academic_year: String, // 如 "2024-25"
}

// ==========================================
// SubjectSchedule - 科目排程
// ==========================================
// 唯一键: (exam_event_id, subject_id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectSchedule {
    pub id: i64,
    pub exam_event_id: i64,
    pub subject_id: i64,
    pub subject_code: String, // 如 "CS101"
    pub subject_name: String,
    pub max_marks: i32, // 本次排程的满分
}

impl SubjectSchedule {
    /// 模板表头（仅 subject_code 会在导入时被解析）
    ///
    /// 格式: `CS101 - Data Structures (50)`
    pub fn template_header(&self) -> String {
        format!(
            "{} - {} ({})",
            self.subject_code, self.subject_name, self.max_marks
        )
    }
}

// ==========================================
// EnrollmentApplication - 考试报名申请
// ==========================================
// selected_subjects: 序列化的科目ID列表（JSON 数组文本，不允许重复）
// 注意: 不保证 selected_subjects ⊆ 本场次排程科目，需由对账层重新校验
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrollmentApplication {
    pub id: i64,
    pub exam_event_id: i64,
    pub student_id: i64,
    pub roll_number: String,
    pub student_name: String,
    pub department: String,
    pub semester: i32,
    pub selected_subjects: String,
    pub status: ApplicationStatus,
}

impl EnrollmentApplication {
    /// 解析已选科目ID列表
    ///
    /// # 返回
    /// - Ok(Vec<i64>): 按原顺序的科目ID
    /// - Err(String): JSON 非法或存在重复ID
    pub fn parse_subject_ids(&self) -> Result<Vec<i64>, String> {
        let ids: Vec<i64> = serde_json::from_str(self.selected_subjects.trim())
            .map_err(|e| format!("科目列表解析失败: {}", e))?;

        let mut seen = std::collections::HashSet::new();
        for id in &ids {
            if !seen.insert(*id) {
                return Err(format!("科目列表存在重复ID: {}", id));
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(selected: &str) -> EnrollmentApplication {
        EnrollmentApplication {
            id: 1,
            exam_event_id: 1,
            student_id: 10,
            roll_number: "21CS001".to_string(),
            student_name: "Asha Rao".to_string(),
            department: "CSE".to_string(),
            semester: 3,
            selected_subjects: selected.to_string(),
            status: ApplicationStatus::Approved,
        }
    }

    #[test]
    fn test_parse_subject_ids_ok() {
        assert_eq!(app("[3, 1, 2]").parse_subject_ids().unwrap(), vec![3, 1, 2]);
        assert!(app("[]").parse_subject_ids().unwrap().is_empty());
    }

    #[test]
    fn test_parse_subject_ids_duplicate() {
        let err = app("[1, 2, 1]").parse_subject_ids().unwrap_err();
        assert!(err.contains("重复"));
    }

    #[test]
    fn test_parse_subject_ids_malformed() {
        assert!(app("1,2").parse_subject_ids().is_err());
        assert!(app("[\"CS101\"]").parse_subject_ids().is_err());
    }

    #[test]
    fn test_template_header() {
        let schedule = SubjectSchedule {
            id: 7,
            exam_event_id: 1,
            subject_id: 3,
            subject_code: "CS101".to_string(),
            subject_name: "Data Structures".to_string(),
            max_marks: 50,
        };
        assert_eq!(schedule.template_header(), "CS101 - Data Structures (50)");
    }
}
