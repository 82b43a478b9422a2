// ==========================================
// 考试成绩批量对账系统 - 成绩 Repository 实现
// ==========================================
// 职责: 实现成绩 upsert / 查询（使用 rusqlite）
// 策略: INSERT ... ON CONFLICT(exam_schedule_id, student_id) DO UPDATE
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::marks::{MarksRecord, MarksUpsertRequest};
use crate::domain::types::UpsertDisposition;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::marks_repo::MarksRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

fn map_record(row: &Row<'_>) -> rusqlite::Result<MarksRecord> {
    let entered_at: Option<String> = row.get(5)?;
    Ok(MarksRecord {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        student_id: row.get(2)?,
        marks_obtained: row.get(3)?,
        marks_entered_by: row.get(4)?,
        marks_entered_at: entered_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

// ==========================================
// MarksRepositoryImpl
// ==========================================
pub struct MarksRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl MarksRepositoryImpl {
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

    /// 统计成绩记录总数
    pub fn count_records(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM student_exam", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl MarksRepository for MarksRepositoryImpl {
    async fn upsert_marks(
        &self,
        request: &MarksUpsertRequest,
    ) -> RepositoryResult<UpsertDisposition> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let existed: bool = tx
            .query_row(
                "SELECT 1 FROM student_exam WHERE exam_schedule_id = ?1 AND student_id = ?2",
                params![request.schedule_id, request.student_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        tx.execute(
            r#"
            INSERT INTO student_exam (
                exam_schedule_id, student_id, marks_obtained, marks_entered_by, marks_entered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(exam_schedule_id, student_id) DO UPDATE SET
                marks_obtained = excluded.marks_obtained,
                marks_entered_by = excluded.marks_entered_by,
                marks_entered_at = excluded.marks_entered_at
            "#,
            params![
                request.schedule_id,
                request.student_id,
                request.marks,
                request.submitted_by,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(if existed {
            UpsertDisposition::Updated
        } else {
            UpsertDisposition::Inserted
        })
    }

    async fn get_marks(
        &self,
        schedule_id: i64,
        student_id: i64,
    ) -> RepositoryResult<Option<MarksRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                r#"
                SELECT id, exam_schedule_id, student_id, marks_obtained,
                       marks_entered_by, marks_entered_at
                FROM student_exam
                WHERE exam_schedule_id = ?1 AND student_id = ?2
                "#,
                params![schedule_id, student_id],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    async fn list_marks_by_schedule(&self, schedule_id: i64) -> RepositoryResult<Vec<MarksRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, exam_schedule_id, student_id, marks_obtained,
                   marks_entered_by, marks_entered_at
            FROM student_exam
            WHERE exam_schedule_id = ?1
            ORDER BY student_id
            "#,
        )?;

        let rows = stmt.query_map(params![schedule_id], map_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}
