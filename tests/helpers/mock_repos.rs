// ==========================================
// Mock 仓储实现 - 用于故障注入测试
// ==========================================

use async_trait::async_trait;
use marks_reconciler::domain::{
    ApplicationStatus, EnrollmentApplication, ExamEvent, MarksRecord, MarksUpsertRequest,
    SubjectSchedule, UpsertDisposition,
};
use marks_reconciler::repository::{
    ExamCatalogRepository, MarksRepository, RepositoryError, RepositoryResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 单科目（CS101，满分 50）+ 三名已通过学生（21CS001..21CS003, student_id = i*100）
///
/// 可分别注入排程/报名查询失败，以及报名查询延迟
#[derive(Debug, Default)]
pub struct MockCatalog {
    pub schedules_down: bool,
    pub applications_down: bool,
    pub fetch_delay: Option<Duration>,
}

#[async_trait]
impl ExamCatalogRepository for MockCatalog {
    async fn get_exam_event(&self, exam_event_id: i64) -> RepositoryResult<Option<ExamEvent>> {
        Ok(Some(ExamEvent {
            id: exam_event_id,
            name: "Mid Term".to_string(),
            department: "CSE".to_string(),
            semester: 3,
            academic_year: "2024-25".to_string(),
        }))
    }

    async fn list_schedules(&self, exam_event_id: i64) -> RepositoryResult<Vec<SubjectSchedule>> {
        if self.schedules_down {
            return Err(RepositoryError::Unavailable("connection refused".to_string()));
        }
        Ok(vec![SubjectSchedule {
            id: 1,
            exam_event_id,
            subject_id: 101,
            subject_code: "CS101".to_string(),
            subject_name: "Programming".to_string(),
            max_marks: 50,
        }])
    }

    async fn list_applications(
        &self,
        exam_event_id: i64,
        status: ApplicationStatus,
    ) -> RepositoryResult<Vec<EnrollmentApplication>> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.applications_down {
            return Err(RepositoryError::Unavailable("read timeout".to_string()));
        }
        Ok((1..=3)
            .map(|i| EnrollmentApplication {
                id: i,
                exam_event_id,
                student_id: i * 100,
                roll_number: format!("21CS00{}", i),
                student_name: format!("Student {}", i),
                department: "CSE".to_string(),
                semester: 3,
                selected_subjects: "[101]".to_string(),
                status,
            })
            .collect())
    }
}

/// 内存成绩存储，可按 student_id 注入失败、注入写入延迟
#[derive(Debug, Default)]
pub struct MockMarksRepo {
    pub failing_students: HashSet<i64>,
    pub write_delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub stored: Mutex<HashMap<(i64, i64), f64>>,
}

impl MockMarksRepo {
    pub fn failing(students: &[i64]) -> Self {
        Self {
            failing_students: students.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            write_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stored_count(&self) -> usize {
        self.stored.lock().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MarksRepository for MockMarksRepo {
    async fn upsert_marks(
        &self,
        request: &MarksUpsertRequest,
    ) -> RepositoryResult<UpsertDisposition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_students.contains(&request.student_id) {
            return Err(RepositoryError::Unavailable("write timeout".to_string()));
        }

        let prev = self
            .stored
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?
            .insert((request.schedule_id, request.student_id), request.marks);
        Ok(if prev.is_some() {
            UpsertDisposition::Updated
        } else {
            UpsertDisposition::Inserted
        })
    }

    async fn get_marks(&self, _: i64, _: i64) -> RepositoryResult<Option<MarksRecord>> {
        Ok(None)
    }

    async fn list_marks_by_schedule(&self, _: i64) -> RepositoryResult<Vec<MarksRecord>> {
        Ok(vec![])
    }
}
