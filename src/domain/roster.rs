// ==========================================
// 考试成绩批量对账系统 - 花名册领域模型
// ==========================================
// 用途: 已通过报名 × 科目排程 的交集（派生，不落库）
// 生命周期: 每次请求重新构建
// ==========================================

use crate::domain::exam::SubjectSchedule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// RosterEntry - 花名册条目
// ==========================================
// 唯一性: 每个 (student_id, schedule_id) 至多一条
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub student_id: i64,
    pub roll_number: String,
    pub student_name: String,
    pub schedule_id: i64,
    pub subject_code: String,
    pub max_marks: i32,
    pub application_id: i64, // 来源申请（同学号多申请时取最小ID）
}

// ==========================================
// RosterWarning - 花名册构建告警
// ==========================================
// 只记录不阻断：单条申请异常不影响整个花名册
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RosterWarning {
    /// 申请的科目列表无法解析（该申请被跳过）
    MalformedApplicationData { application_id: i64, detail: String },

    /// 同一学号存在多条已通过申请
    DuplicateRollNumber {
        roll_number: String,
        kept_application_id: i64,
        merged_application_ids: Vec<i64>,
    },

    /// 申请引用了本场次未排程的科目
    UnscheduledSubject { application_id: i64, subject_id: i64 },

    /// 同一场次内两个排程使用了相同科目代码
    DuplicateSubjectCode {
        subject_code: String,
        kept_schedule_id: i64,
        ignored_schedule_id: i64,
    },
}

// ==========================================
// Roster - 花名册
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pub exam_event_id: i64,
    pub schedules: Vec<SubjectSchedule>, // 按 schedule_id 升序
    pub entries: Vec<RosterEntry>,       // 按 (roll_number, subject_code) 升序
    pub warnings: Vec<RosterWarning>,
}

impl Roster {
    /// 构建 (学号, 科目代码) → 排程/学生 索引
    pub fn index(&self) -> RosterIndex {
        RosterIndex::from_entries(&self.entries)
    }

    /// 某个排程下的全部条目（保持花名册顺序）
    pub fn entries_for_schedule(&self, schedule_id: i64) -> Vec<&RosterEntry> {
        self.entries
            .iter()
            .filter(|e| e.schedule_id == schedule_id)
            .collect()
    }

    /// 不同学号数量
    pub fn student_count(&self) -> usize {
        let mut rolls: Vec<&str> = self.entries.iter().map(|e| e.roll_number.as_str()).collect();
        rolls.dedup();
        rolls.len()
    }
}

// ==========================================
// RosterSlot / RosterIndex - 对账查找索引
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterSlot {
    pub schedule_id: i64,
    pub student_id: i64,
    pub max_marks: i32,
}

#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    slots: HashMap<(String, String), RosterSlot>,
}

impl RosterIndex {
    pub fn from_entries(entries: &[RosterEntry]) -> Self {
        let slots = entries
            .iter()
            .map(|e| {
                (
                    (e.roll_number.clone(), e.subject_code.clone()),
                    RosterSlot {
                        schedule_id: e.schedule_id,
                        student_id: e.student_id,
                        max_marks: e.max_marks,
                    },
                )
            })
            .collect();

        Self { slots }
    }

    pub fn lookup(&self, roll_number: &str, subject_code: &str) -> Option<RosterSlot> {
        self.slots
            .get(&(roll_number.to_string(), subject_code.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
