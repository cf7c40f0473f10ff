use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::dialect::ApiDialect;
use crate::error::{Error, Result};
use crate::models::{Issue, SearchPage};

/// 全件取得時の1回あたりの取得件数
pub const DEFAULT_BATCH_SIZE: u32 = 100;
/// 全件取得で呼び出すページ数の上限
pub const DEFAULT_MAX_SEARCH_PAGES: u32 = 1000;
/// 並び順の既定値
pub const DEFAULT_ORDER_BY: &str = "created DESC";
/// 日付条件の既定フィールド
pub const DEFAULT_DATE_FIELD: &str = "created";

/// 全件取得の条件
#[derive(Debug, Clone, Default)]
pub struct AllIssuesOptions {
    /// プロジェクトキーで絞り込む
    pub project: Option<String>,
    /// この日付以降（`2024-01-01`、`2024-01-01 10:00`、`-7d` など）
    pub start_date: Option<String>,
    /// 日付条件に使うフィールド（`created` / `updated` / `resolved`）
    pub date_field: Option<String>,
    /// 取得件数の上限（`None` で無制限）
    pub max_results: Option<usize>,
    /// 追加のJQL（括弧で囲んで結合する）
    pub jql: Option<String>,
    /// 並び順
    pub order_by: Option<String>,
}

impl AllIssuesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    pub fn date_field(mut self, date_field: impl Into<String>) -> Self {
        self.date_field = Some(date_field.into());
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn jql(mut self, jql: impl Into<String>) -> Self {
        self.jql = Some(jql.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// 条件からJQLを組み立てる
    pub fn to_jql(&self) -> String {
        let mut parts = Vec::new();

        if let Some(project) = non_empty(&self.project) {
            parts.push(format!("project = {}", project));
        }

        if let Some(start_date) = non_empty(&self.start_date) {
            let field = non_empty(&self.date_field).unwrap_or(DEFAULT_DATE_FIELD);
            parts.push(format!("{} >= '{}'", field, start_date));
        }

        if let Some(jql) = non_empty(&self.jql) {
            parts.push(format!("({})", jql));
        }

        let order_by = non_empty(&self.order_by).unwrap_or(DEFAULT_ORDER_BY);
        let filter = parts.join(" AND ");
        if filter.is_empty() {
            format!("ORDER BY {}", order_by)
        } else {
            format!("{} ORDER BY {}", filter, order_by)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 方言を介した課題検索
#[derive(Clone)]
pub struct IssueSearch {
    dialect: Arc<dyn ApiDialect>,
    batch_size: u32,
    max_pages: u32,
}

impl IssueSearch {
    pub fn new(dialect: Arc<dyn ApiDialect>) -> Self {
        Self {
            dialect,
            batch_size: DEFAULT_BATCH_SIZE,
            max_pages: DEFAULT_MAX_SEARCH_PAGES,
        }
    }

    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn dialect(&self) -> &Arc<dyn ApiDialect> {
        &self.dialect
    }

    /// 1ページ分を検索
    pub async fn search(
        &self,
        jql: &str,
        start_at: u32,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchPage> {
        if max_results == 0 {
            return Err(Error::InvalidInput(
                "max_results must be greater than zero".to_string(),
            ));
        }
        self.dialect.search(jql, start_at, max_results, cancel).await
    }

    /// 条件に一致する課題をページングしながらすべて取得
    ///
    /// いずれかのページで失敗した場合はそれまでの結果を破棄してエラーを返す。
    pub async fn search_all(
        &self,
        options: &AllIssuesOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>> {
        let jql = options.to_jql();
        self.collect(&jql, options.max_results, cancel).await
    }

    /// 直近 `days` 日に作成された課題を取得
    pub async fn recent_issues(
        &self,
        days: u32,
        project: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>> {
        let mut options = AllIssuesOptions::new()
            .start_date(format!("-{}d", days))
            .date_field(DEFAULT_DATE_FIELD)
            .order_by(DEFAULT_ORDER_BY);
        if let Some(project) = project {
            options = options.project(project);
        }
        self.search_all(&options, cancel).await
    }

    /// 日付範囲（両端を含む）の課題を取得
    pub async fn issues_in_date_range(
        &self,
        start: &str,
        end: &str,
        date_field: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>> {
        if start.trim().is_empty() || end.trim().is_empty() {
            return Err(Error::InvalidInput(
                "start and end dates are required".to_string(),
            ));
        }
        let field = date_field
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_DATE_FIELD);
        let jql = format!(
            "{field} >= '{}' AND {field} <= '{}' ORDER BY {field} DESC",
            start.trim(),
            end.trim()
        );
        self.collect(&jql, None, cancel).await
    }

    async fn collect(
        &self,
        jql: &str,
        limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>> {
        let mut all_issues: Vec<Issue> = Vec::new();
        let mut start_at = 0u32;

        for page_number in 1..=self.max_pages {
            let page = self.search(jql, start_at, self.batch_size, cancel).await?;
            let is_final = page.is_final(self.batch_size);
            let returned = page.issues.len() as u32;
            all_issues.extend(page.issues);

            if let Some(limit) = limit {
                if all_issues.len() >= limit {
                    all_issues.truncate(limit);
                    break;
                }
            }

            if is_final {
                break;
            }

            if page_number == self.max_pages {
                tracing::warn!(
                    jql,
                    pages = self.max_pages,
                    fetched = all_issues.len(),
                    "search page limit reached, stopping"
                );
            }
            start_at = start_at.saturating_add(returned);
        }

        tracing::debug!(
            dialect = self.dialect.name(),
            jql,
            fetched = all_issues.len(),
            "search completed"
        );
        Ok(all_issues)
    }
}
