// ==========================================
// 考试成绩批量对账系统 - 成绩写入派发器
// ==========================================
// 职责: 将写入计划派发到持久化服务
// 并发: 不同 (schedule, student) 键并发（有界），同键按行序串行，最后一次为准
// 取消: 取消后不再派发新写入，在途写入允许完成
// 失败: 单条失败重试后仍失败 → PersistenceFailure，不影响其他写入
// ==========================================

use crate::config::ReconcileSettings;
use crate::domain::marks::{CellError, MarksUpsertRequest, Rejection};
use crate::domain::types::UpsertDisposition;
use crate::engine::marks_reconciler::PlannedUpsert;
use crate::repository::{MarksRepository, RepositoryError};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ==========================================
// CancelFlag - 导入取消标记
// ==========================================
// 子标记: 父标记取消时子标记随之取消，子标记取消不影响父标记
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    own: Arc<AtomicBool>,
    parent: Option<Box<CancelFlag>>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 派生子标记（单次导入的截止时间只作用于子标记）
    pub fn child(&self) -> Self {
        Self {
            own: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// 到期后自动取消（调用方负责在完成后 abort 返回的任务）
    pub fn cancel_after(&self, timeout: Duration) -> JoinHandle<()> {
        let flag = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(timeout_ms = timeout.as_millis() as u64, "导入超时，停止派发新的成绩写入");
            flag.cancel();
        })
    }
}

// ==========================================
// DispatchOptions
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&ReconcileSettings::default())
    }
}

impl From<&ReconcileSettings> for DispatchOptions {
    fn from(settings: &ReconcileSettings) -> Self {
        Self {
            concurrency: settings.upsert_concurrency.max(1),
            max_retries: settings.upsert_max_retries,
            retry_backoff_ms: settings.retry_backoff_ms,
        }
    }
}

// ==========================================
// DispatchOutcome
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    pub accepted: usize,
    pub inserted: usize,
    pub updated: usize,
    pub not_dispatched: usize,
    pub cancelled: bool,
    pub failures: Vec<Rejection>,
}

impl DispatchOutcome {
    fn merge(&mut self, other: DispatchOutcome) {
        self.accepted += other.accepted;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.not_dispatched += other.not_dispatched;
        self.failures.extend(other.failures);
    }
}

// ==========================================
// UpsertDispatcher
// ==========================================
pub struct UpsertDispatcher {
    marks_repo: Arc<dyn MarksRepository>,
    options: DispatchOptions,
}

impl UpsertDispatcher {
    pub fn new(marks_repo: Arc<dyn MarksRepository>, options: DispatchOptions) -> Self {
        Self { marks_repo, options }
    }

    /// 派发全部写入计划
    pub async fn dispatch(&self, planned: Vec<PlannedUpsert>, cancel: &CancelFlag) -> DispatchOutcome {
        let total = planned.len();
        let groups = group_by_key(planned);
        let group_count = groups.len();

        let results: Vec<DispatchOutcome> = stream::iter(groups)
            .map(|group| self.apply_group(group, cancel))
            .buffer_unordered(self.options.concurrency)
            .collect()
            .await;

        let mut outcome = DispatchOutcome::default();
        for result in results {
            outcome.merge(result);
        }
        outcome.cancelled = cancel.is_cancelled() && outcome.not_dispatched > 0;

        info!(
            total,
            groups = group_count,
            accepted = outcome.accepted,
            inserted = outcome.inserted,
            updated = outcome.updated,
            failed = outcome.failures.len(),
            not_dispatched = outcome.not_dispatched,
            "成绩写入派发完成"
        );

        outcome
    }

    /// 同键写入按行序串行执行
    async fn apply_group(&self, group: Vec<PlannedUpsert>, cancel: &CancelFlag) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        let total = group.len();

        for (idx, planned) in group.into_iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.not_dispatched += total - idx;
                break;
            }

            match self.upsert_with_retry(&planned.request).await {
                Ok(disposition) => {
                    outcome.accepted += 1;
                    match disposition {
                        UpsertDisposition::Inserted => outcome.inserted += 1,
                        UpsertDisposition::Updated => outcome.updated += 1,
                    }
                }
                Err(e) => {
                    warn!(
                        row = planned.row,
                        roll_number = %planned.roll_number,
                        subject_code = %planned.subject_code,
                        error = %e,
                        "成绩写入失败"
                    );
                    outcome.failures.push(Rejection {
                        row: planned.row,
                        column: Some(planned.column),
                        subject_code: Some(planned.subject_code.clone()),
                        reason: CellError::PersistenceFailure {
                            roll_number: planned.roll_number,
                            subject_code: planned.subject_code,
                            detail: e.to_string(),
                        },
                    });
                }
            }
        }

        outcome
    }

    /// 失败后按线性退避重试（upsert 幂等，重试安全）
    async fn upsert_with_retry(
        &self,
        request: &MarksUpsertRequest,
    ) -> Result<UpsertDisposition, RepositoryError> {
        let mut attempt: u32 = 0;
        loop {
            match self.marks_repo.upsert_marks(request).await {
                Ok(disposition) => return Ok(disposition),
                Err(e) if attempt < self.options.max_retries => {
                    attempt += 1;
                    let backoff = self.options.retry_backoff_ms * u64::from(attempt);
                    debug!(
                        schedule_id = request.schedule_id,
                        student_id = request.student_id,
                        attempt,
                        backoff_ms = backoff,
                        error = %e,
                        "成绩写入重试"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 按幂等键分组（组按首次出现排序，组内按行序）
fn group_by_key(planned: Vec<PlannedUpsert>) -> Vec<Vec<PlannedUpsert>> {
    let mut slot_of: HashMap<(i64, i64), usize> = HashMap::new();
    let mut groups: Vec<Vec<PlannedUpsert>> = Vec::new();

    for item in planned {
        let idx = *slot_of.entry(item.key()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(item);
    }

    for group in &mut groups {
        group.sort_by_key(|p| (p.row, p.column));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::marks::MarksRecord;
    use crate::repository::RepositoryResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 内存实现，按 student_id 注入失败次数
    #[derive(Default)]
    struct MemoryMarksRepo {
        stored: Mutex<HashMap<(i64, i64), f64>>,
        writes: Mutex<Vec<(i64, i64, f64)>>,
        failures_left: Mutex<HashMap<i64, u32>>,
    }

    #[async_trait]
    impl MarksRepository for MemoryMarksRepo {
        async fn upsert_marks(
            &self,
            request: &MarksUpsertRequest,
        ) -> RepositoryResult<UpsertDisposition> {
            {
                let mut failures = self.failures_left.lock().unwrap();
                if let Some(left) = failures.get_mut(&request.student_id) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(RepositoryError::Unavailable("injected".to_string()));
                    }
                }
            }
            tokio::task::yield_now().await;
            self.writes
                .lock()
                .unwrap()
                .push((request.schedule_id, request.student_id, request.marks));
            let prev = self
                .stored
                .lock()
                .unwrap()
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

    fn planned(row: usize, schedule_id: i64, student_id: i64, marks: f64) -> PlannedUpsert {
        PlannedUpsert {
            row,
            column: 2,
            roll_number: format!("R{}", student_id),
            subject_code: format!("S{}", schedule_id),
            request: MarksUpsertRequest {
                schedule_id,
                student_id,
                marks,
                submitted_by: "admin".to_string(),
            },
        }
    }

    fn options(concurrency: usize, max_retries: u32) -> DispatchOptions {
        DispatchOptions {
            concurrency,
            max_retries,
            retry_backoff_ms: 1,
        }
    }

    #[test]
    fn test_group_by_key_keeps_row_order() {
        let groups = group_by_key(vec![
            planned(5, 1, 10, 3.0),
            planned(2, 1, 11, 1.0),
            planned(3, 1, 10, 2.0),
        ]);
        assert_eq!(groups.len(), 2);
        let rows: Vec<usize> = groups[0].iter().map(|p| p.row).collect();
        assert_eq!(rows, vec![3, 5]);
    }

    #[tokio::test]
    async fn test_same_key_last_write_wins() {
        let repo = Arc::new(MemoryMarksRepo::default());
        let dispatcher = UpsertDispatcher::new(repo.clone(), options(4, 0));

        let outcome = dispatcher
            .dispatch(
                vec![
                    planned(4, 1, 10, 40.0),
                    planned(2, 1, 10, 20.0),
                    planned(3, 2, 11, 7.0),
                ],
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(outcome.accepted, 3);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(repo.stored.lock().unwrap()[&(1, 10)], 40.0);
    }

    #[tokio::test]
    async fn test_failure_isolated_after_retries() {
        let repo = Arc::new(MemoryMarksRepo::default());
        repo.failures_left.lock().unwrap().insert(10, 10);
        repo.failures_left.lock().unwrap().insert(11, 1);
        let dispatcher = UpsertDispatcher::new(repo.clone(), options(2, 2));

        let outcome = dispatcher
            .dispatch(
                vec![planned(2, 1, 10, 1.0), planned(3, 1, 11, 2.0), planned(4, 1, 12, 3.0)],
                &CancelFlag::new(),
            )
            .await;

        // 11 首次失败后重试成功
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].row, 2);
        assert!(matches!(
            outcome.failures[0].reason,
            CellError::PersistenceFailure { .. }
        ));
        // 10 共尝试 3 次（1 + 2 次重试）
        assert_eq!(repo.failures_left.lock().unwrap()[&10], 7);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let repo = Arc::new(MemoryMarksRepo::default());
        let dispatcher = UpsertDispatcher::new(repo.clone(), options(2, 0));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = dispatcher
            .dispatch(vec![planned(2, 1, 10, 1.0), planned(3, 1, 10, 2.0)], &cancel)
            .await;

        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.not_dispatched, 2);
        assert!(outcome.cancelled);
        assert!(repo.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_child_flag_follows_parent_only() {
        let parent = CancelFlag::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        assert!(!other.is_cancelled());
        parent.cancel();
        assert!(other.is_cancelled());
    }
}
