// ==========================================
// 考试成绩批量对账系统 - 成绩模板生成引擎
// ==========================================
// 职责: 花名册 → 可编辑的成绩模板（CSV）
// 行: 去重学号（升序）
// 列: Roll Number, Student Name, 各排程科目（按 schedule_id 升序，零报名科目同样出列）
// 单元格: "0" = 已报名未录入, "NA" = 未报考
// ==========================================

use crate::domain::exam::ExamEvent;
use crate::domain::roster::Roster;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 固定表头
pub const ROLL_NUMBER_HEADER: &str = "Roll Number";
pub const STUDENT_NAME_HEADER: &str = "Student Name";

/// 单元格哨兵值
pub const ELIGIBLE_SENTINEL: &str = "0";
pub const NOT_ENROLLED_SENTINEL: &str = "NA";

// ==========================================
// MarksTemplate - 成绩模板
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct MarksTemplate {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MarksTemplate {
    /// 数据行数（不含表头）
    pub fn data_row_count(&self) -> usize {
        self.rows.len()
    }

    /// 科目列数
    pub fn subject_column_count(&self) -> usize {
        self.header.len().saturating_sub(2)
    }

    /// 序列化为 CSV 文本（含表头）
    pub fn to_csv(&self) -> ImportResult<String> {
        let write_err = |e: csv::Error| ImportError::CsvWriteError(e.to_string());

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.header).map_err(write_err)?;
        for row in &self.rows {
            writer.write_record(row).map_err(write_err)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ImportError::CsvWriteError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ImportError::CsvWriteError(e.to_string()))
    }
}

// ==========================================
// TemplateGenerator
// ==========================================
pub struct TemplateGenerator;

impl TemplateGenerator {
    /// 由花名册生成模板
    pub fn generate(&self, roster: &Roster) -> MarksTemplate {
        let mut schedules: Vec<_> = roster.schedules.iter().collect();
        schedules.sort_by_key(|s| s.id);

        // 同代码重复排程只出一列（花名册中仅保留最小排程ID）
        let mut seen_codes = HashSet::new();
        schedules.retain(|s| seen_codes.insert(s.subject_code.as_str()));

        let mut header = vec![
            ROLL_NUMBER_HEADER.to_string(),
            STUDENT_NAME_HEADER.to_string(),
        ];
        header.extend(schedules.iter().map(|s| s.template_header()));

        // 学号 → (姓名, 已报名排程集合)
        let mut students: BTreeMap<&str, (&str, HashSet<i64>)> = BTreeMap::new();
        for entry in &roster.entries {
            students
                .entry(entry.roll_number.as_str())
                .or_insert_with(|| (entry.student_name.as_str(), HashSet::new()))
                .1
                .insert(entry.schedule_id);
        }

        let rows: Vec<Vec<String>> = students
            .into_iter()
            .map(|(roll_number, (student_name, enrolled))| {
                let mut row = Vec::with_capacity(header.len());
                row.push(roll_number.to_string());
                row.push(student_name.to_string());
                row.extend(schedules.iter().map(|s| {
                    if enrolled.contains(&s.id) {
                        ELIGIBLE_SENTINEL.to_string()
                    } else {
                        NOT_ENROLLED_SENTINEL.to_string()
                    }
                }));
                row
            })
            .collect();

        debug!(
            exam_event_id = roster.exam_event_id,
            rows = rows.len(),
            columns = schedules.len(),
            "成绩模板已生成"
        );

        MarksTemplate { header, rows }
    }

    /// 模板文件名: `<场次名称(空白→_)>_Marks_<YYYY-MM-DD>.csv`
    pub fn file_name(event: &ExamEvent, date: NaiveDate) -> String {
        let name = event.name.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{}_Marks_{}.csv", name, date.format("%Y-%m-%d"))
    }

    /// 写入目录，返回完整路径
    pub fn write_to_dir(
        &self,
        template: &MarksTemplate,
        dir: &Path,
        file_name: &str,
    ) -> ImportResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, template.to_csv()?)?;

        info!(path = %path.display(), "成绩模板已写入");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exam::SubjectSchedule;
    use crate::domain::roster::RosterEntry;

    fn schedule(id: i64, code: &str, max: i32) -> SubjectSchedule {
        SubjectSchedule {
            id,
            exam_event_id: 1,
            subject_id: id + 100,
            subject_code: code.to_string(),
            subject_name: format!("{} Name", code),
            max_marks: max,
        }
    }

    fn entry(roll: &str, schedule_id: i64, code: &str) -> RosterEntry {
        RosterEntry {
            student_id: 1,
            roll_number: roll.to_string(),
            student_name: format!("Student {}", roll),
            schedule_id,
            subject_code: code.to_string(),
            max_marks: 50,
            application_id: 1,
        }
    }

    fn roster() -> Roster {
        Roster {
            exam_event_id: 1,
            schedules: vec![
                schedule(3, "CS103", 100),
                schedule(1, "CS101", 50),
                schedule(2, "CS102", 80),
            ],
            entries: vec![
                entry("21CS001", 1, "CS101"),
                entry("21CS001", 2, "CS102"),
                entry("21CS002", 1, "CS101"),
            ],
            warnings: vec![],
        }
    }

    #[test]
    fn test_generate_layout_and_sentinels() {
        let template = TemplateGenerator.generate(&roster());

        assert_eq!(
            template.header,
            vec![
                "Roll Number",
                "Student Name",
                "CS101 - CS101 Name (50)",
                "CS102 - CS102 Name (80)",
                "CS103 - CS103 Name (100)",
            ]
        );
        assert_eq!(template.subject_column_count(), 3);
        assert_eq!(template.rows.len(), 2);
        assert_eq!(template.rows[0], vec!["21CS001", "Student 21CS001", "0", "0", "NA"]);
        assert_eq!(template.rows[1], vec!["21CS002", "Student 21CS002", "0", "NA", "NA"]);
    }

    #[test]
    fn test_to_csv_quotes_commas() {
        let mut r = roster();
        r.entries[2].student_name = "Rao, Ravi".to_string();
        let csv_text = TemplateGenerator.generate(&r).to_csv().unwrap();

        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Roll Number,Student Name,CS101 - CS101 Name (50),CS102 - CS102 Name (80),CS103 - CS103 Name (100)"
        );
        assert_eq!(lines.nth(1).unwrap(), "21CS002,\"Rao, Ravi\",0,NA,NA");
    }

    #[test]
    fn test_file_name() {
        let event = ExamEvent {
            id: 1,
            name: "End Sem  Nov 2024".to_string(),
            department: "CSE".to_string(),
            semester: 3,
            academic_year: "2024-25".to_string(),
        };
        let date = NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();
        assert_eq!(
            TemplateGenerator::file_name(&event, date),
            "End_Sem_Nov_2024_Marks_2024-11-20.csv"
        );
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let template = TemplateGenerator.generate(&roster());
        let path = TemplateGenerator
            .write_to_dir(&template, dir.path(), "marks.csv")
            .unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with("Roll Number,Student Name"));
    }
}
