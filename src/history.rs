use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::changelog::{ChangelogPager, DEFAULT_MAX_CHANGELOG_PAGES};
use crate::dialect::ApiDialect;
use crate::error::{Error, Result};
use crate::reconstruct::{StatusChange, reconstruct};

/// 履歴取得の設定
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// 同時に処理する課題数（1で逐次処理）
    pub concurrency: usize,
    /// 1課題あたりの呼び出し回数の上限
    pub max_pages: u32,
}

impl HistoryConfig {
    pub fn new() -> Self {
        Self {
            concurrency: 1,
            max_pages: DEFAULT_MAX_CHANGELOG_PAGES,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// 1課題のステータス遷移の時系列
#[derive(Debug, Clone)]
pub struct IssueTimeline {
    pub key: String,
    pub changes: Vec<StatusChange>,
    /// 変更履歴をすべて取得できたか（`false` なら一部のみ）
    pub complete: bool,
}

/// 取得に失敗した課題
#[derive(Debug)]
pub struct IssueFailure {
    pub key: String,
    pub error: Error,
}

/// 複数課題の取得結果
///
/// 入力の各キーは `timelines` と `failures` のどちらか一方に、入力順で現れる。
#[derive(Debug, Default)]
pub struct BatchHistoryReport {
    pub timelines: Vec<IssueTimeline>,
    pub failures: Vec<IssueFailure>,
}

impl BatchHistoryReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn processed(&self) -> usize {
        self.timelines.len() + self.failures.len()
    }

    pub fn timeline(&self, key: &str) -> Option<&IssueTimeline> {
        self.timelines.iter().find(|t| t.key == key)
    }
}

/// 課題のステータス遷移履歴を取得するサービス
#[derive(Clone)]
pub struct HistoryService {
    pager: ChangelogPager,
    config: HistoryConfig,
}

impl HistoryService {
    pub fn new(dialect: Arc<dyn ApiDialect>) -> Self {
        Self::with_config(dialect, HistoryConfig::default())
    }

    pub fn with_config(dialect: Arc<dyn ApiDialect>, config: HistoryConfig) -> Self {
        Self {
            pager: ChangelogPager::new(dialect).max_pages(config.max_pages),
            config,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// 1課題のステータス遷移を古い順に取得
    pub async fn issue_status_changes(
        &self,
        issue_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StatusChange>> {
        Ok(self.issue_timeline(issue_key, cancel).await?.changes)
    }

    pub async fn issue_timeline(
        &self,
        issue_key: &str,
        cancel: &CancellationToken,
    ) -> Result<IssueTimeline> {
        let page_set = self.pager.fetch_history(issue_key, cancel).await?;
        let changes = reconstruct(&page_set.issue, &page_set.pages);

        Ok(IssueTimeline {
            key: issue_key.to_string(),
            complete: page_set.is_complete(),
            changes,
        })
    }

    /// 複数課題のステータス遷移を取得
    ///
    /// 個々の課題の失敗は `failures` に集め、残りの課題の処理を続ける。
    /// キャンセルされた場合、未処理の課題は `Error::Cancelled` の失敗として返る。
    pub async fn status_changes_for_issues<S>(
        &self,
        issue_keys: &[S],
        cancel: &CancellationToken,
    ) -> BatchHistoryReport
    where
        S: AsRef<str>,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut outcomes: Vec<Option<Result<IssueTimeline>>> =
            issue_keys.iter().map(|_| None).collect();

        for (index, key) in issue_keys.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                break;
            };

            let service = self.clone();
            let key = key.as_ref().to_string();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = service.issue_timeline(&key, &cancel).await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => outcomes[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "history worker task failed"),
            }
        }

        let mut report = BatchHistoryReport::default();
        for (key, outcome) in issue_keys.iter().zip(outcomes) {
            let key = key.as_ref().to_string();
            let outcome = outcome.unwrap_or_else(|| {
                Err(if cancel.is_cancelled() {
                    Error::Cancelled
                } else {
                    Error::Unexpected(format!("no result produced for {}", key))
                })
            });

            match outcome {
                Ok(timeline) => report.timelines.push(timeline),
                Err(error) => {
                    tracing::warn!(issue_key = %key, error = %error, "failed to fetch status history");
                    report.failures.push(IssueFailure { key, error });
                }
            }
        }

        tracing::info!(
            requested = issue_keys.len(),
            succeeded = report.timelines.len(),
            failed = report.failures.len(),
            "status history batch finished"
        );
        report
    }
}
