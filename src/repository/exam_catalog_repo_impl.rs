// ==========================================
// 考试成绩批量对账系统 - 考试目录 Repository 实现
// ==========================================
// 职责: 实现考试场次/排程/报名读取（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::exam::{EnrollmentApplication, ExamEvent, SubjectSchedule};
use crate::domain::types::ApplicationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::exam_catalog_repo::ExamCatalogRepository;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ExamCatalogRepositoryImpl
// ==========================================
pub struct ExamCatalogRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ExamCatalogRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 写入（供初始化/测试数据使用）=====

    pub fn insert_exam_event(&self, event: &ExamEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO exam_event (id, name, department, semester, academic_year)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.name,
                event.department,
                event.semester,
                event.academic_year
            ],
        )?;
        Ok(())
    }

    /// 写入科目（若不存在）及其排程
    pub fn insert_schedule(&self, schedule: &SubjectSchedule) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO subject (id, code, name) VALUES (?1, ?2, ?3)",
            params![
                schedule.subject_id,
                schedule.subject_code,
                schedule.subject_name
            ],
        )?;
        tx.execute(
            "INSERT INTO exam_schedule (id, exam_event_id, subject_id, total_marks)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                schedule.id,
                schedule.exam_event_id,
                schedule.subject_id,
                schedule.max_marks
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_application(&self, app: &EnrollmentApplication) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO enrollment_application (
                id, exam_event_id, student_id, roll_number, student_name,
                department, semester, selected_subjects, application_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                app.id,
                app.exam_event_id,
                app.student_id,
                app.roll_number,
                app.student_name,
                app.department,
                app.semester,
                app.selected_subjects,
                app.status.as_str(),
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ExamCatalogRepository for ExamCatalogRepositoryImpl {
    async fn get_exam_event(&self, exam_event_id: i64) -> RepositoryResult<Option<ExamEvent>> {
        let conn = self.get_conn()?;
        let event = conn
            .query_row(
                "SELECT id, name, department, semester, academic_year
                 FROM exam_event WHERE id = ?1",
                params![exam_event_id],
                |row| {
                    Ok(ExamEvent {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        department: row.get(2)?,
                        semester: row.get(3)?,
                        academic_year: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(event)
    }

    async fn list_schedules(&self, exam_event_id: i64) -> RepositoryResult<Vec<SubjectSchedule>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT es.id, es.exam_event_id, es.subject_id, s.code, s.name, es.total_marks
            FROM exam_schedule es
            JOIN subject s ON s.id = es.subject_id
            WHERE es.exam_event_id = ?1
            ORDER BY es.id
            "#,
        )?;

        let rows = stmt.query_map(params![exam_event_id], |row| {
            Ok(SubjectSchedule {
                id: row.get(0)?,
                exam_event_id: row.get(1)?,
                subject_id: row.get(2)?,
                subject_code: row.get(3)?,
                subject_name: row.get(4)?,
                max_marks: row.get(5)?,
            })
        })?;

        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(row?);
        }
        Ok(schedules)
    }

    async fn list_applications(
        &self,
        exam_event_id: i64,
        status: ApplicationStatus,
    ) -> RepositoryResult<Vec<EnrollmentApplication>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, exam_event_id, student_id, roll_number, student_name,
                   department, semester, selected_subjects, application_status
            FROM enrollment_application
            WHERE exam_event_id = ?1 AND UPPER(application_status) = ?2
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![exam_event_id, status.as_str()], |row| {
            let raw_status: String = row.get(8)?;
            Ok((
                EnrollmentApplication {
                    id: row.get(0)?,
                    exam_event_id: row.get(1)?,
                    student_id: row.get(2)?,
                    roll_number: row.get(3)?,
                    student_name: row.get(4)?,
                    department: row.get(5)?,
                    semester: row.get(6)?,
                    selected_subjects: row.get(7)?,
                    status: ApplicationStatus::Pending,
                },
                raw_status,
            ))
        })?;

        let mut applications = Vec::new();
        for row in rows {
            let (mut app, raw_status) = row?;
            app.status = ApplicationStatus::parse(&raw_status).ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: "application_status".to_string(),
                    message: format!("未知状态: {}", raw_status),
                }
            })?;
            applications.push(app);
        }
        Ok(applications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> ExamCatalogRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ExamCatalogRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_list_schedules_joins_subject() {
        let repo = setup();
        repo.insert_exam_event(&ExamEvent {
            id: 1,
            name: "Mid Term".to_string(),
            department: "CSE".to_string(),
            semester: 3,
            academic_year: "2024-25".to_string(),
        })
        .unwrap();
        repo.insert_schedule(&SubjectSchedule {
            id: 5,
            exam_event_id: 1,
            subject_id: 101,
            subject_code: "CS101".to_string(),
            subject_name: "Programming".to_string(),
            max_marks: 50,
        })
        .unwrap();

        let schedules = repo.list_schedules(1).await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].subject_code, "CS101");
        assert_eq!(schedules[0].max_marks, 50);

        assert!(repo.get_exam_event(1).await.unwrap().is_some());
        assert!(repo.get_exam_event(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_applications_filters_status() {
        let repo = setup();
        repo.insert_exam_event(&ExamEvent {
            id: 1,
            name: "Mid Term".to_string(),
            department: "CSE".to_string(),
            semester: 3,
            academic_year: "2024-25".to_string(),
        })
        .unwrap();

        for (id, status) in [
            (1, ApplicationStatus::Approved),
            (2, ApplicationStatus::Pending),
            (3, ApplicationStatus::Approved),
        ] {
            repo.insert_application(&EnrollmentApplication {
                id,
                exam_event_id: 1,
                student_id: 100 + id,
                roll_number: format!("21CS00{}", id),
                student_name: format!("Student {}", id),
                department: "CSE".to_string(),
                semester: 3,
                selected_subjects: "[101]".to_string(),
                status,
            })
            .unwrap();
        }

        let approved = repo
            .list_applications(1, ApplicationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
