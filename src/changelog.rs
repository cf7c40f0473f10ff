use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::dialect::ApiDialect;
use crate::error::{Error, Result};
use crate::models::{ChangelogPage, HistoryEntry, Issue};

/// 1課題あたりに取得する変更履歴ページ数の上限
pub const DEFAULT_MAX_CHANGELOG_PAGES: u32 = 100;

/// 1課題分の変更履歴ページ
///
/// `issue` は履歴を取り外した課題本体、`pages` は取得順（先頭は課題に
/// 埋め込まれていたページ）。続きのページ取得に失敗した場合、それまでの
/// ページは保持したまま `continuation_error` にエラーを記録する。
#[derive(Debug)]
pub struct HistoryPageSet {
    pub issue: Issue,
    pub pages: Vec<ChangelogPage>,
    /// サーバーが宣言した履歴の総数（各ページが返した値の最大）
    pub total: u32,
    /// 実際に取得できた履歴の件数
    pub retrieved: u32,
    /// 呼び出し回数の上限で打ち切ったか
    pub budget_exhausted: bool,
    pub continuation_error: Option<Error>,
}

impl HistoryPageSet {
    /// 宣言された総数をすべて取得できたか
    pub fn is_complete(&self) -> bool {
        self.continuation_error.is_none() && !self.budget_exhausted && self.retrieved >= self.total
    }

    pub fn histories(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.pages.iter().flat_map(|page| page.histories.iter())
    }
}

/// 変更履歴のページング取得
#[derive(Clone)]
pub struct ChangelogPager {
    dialect: Arc<dyn ApiDialect>,
    max_pages: u32,
}

impl ChangelogPager {
    pub fn new(dialect: Arc<dyn ApiDialect>) -> Self {
        Self {
            dialect,
            max_pages: DEFAULT_MAX_CHANGELOG_PAGES,
        }
    }

    /// 呼び出し回数の上限（課題本体の取得を含む）
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub async fn fetch_changelog_page(
        &self,
        issue_key: &str,
        start_at: u32,
        cancel: &CancellationToken,
    ) -> Result<ChangelogPage> {
        self.dialect
            .fetch_changelog_page(issue_key, start_at, cancel)
            .await
    }

    /// 課題と変更履歴の全ページを取得
    ///
    /// 最初の取得（課題本体）が失敗した場合はエラー。続きのページの失敗は
    /// 警告ログを出して部分的な結果を返す。キャンセルは常にエラーになる。
    ///
    /// 総数とページサイズは続きのページを受け取るたびに更新し、呼び出し
    /// 回数の上限もそれに合わせて再計算する。
    pub async fn fetch_history(
        &self,
        issue_key: &str,
        cancel: &CancellationToken,
    ) -> Result<HistoryPageSet> {
        let mut issue = self.dialect.fetch_issue(issue_key, cancel).await?;
        let first = issue.changelog.take().unwrap_or_default();

        let mut total = first.total;
        let mut page_size = page_size_of(&first);
        let mut retrieved = first.histories.len() as u32;
        let mut exhausted = first.histories.is_empty() || first.is_last == Some(true);
        let mut pages = vec![first];
        let mut calls = 1u32;
        let mut budget_exhausted = false;
        let mut continuation_error = None;

        while retrieved < total && !exhausted {
            if calls >= call_budget(total, page_size, self.max_pages) {
                tracing::warn!(
                    issue_key,
                    total,
                    retrieved,
                    calls,
                    "changelog call budget exhausted before reaching declared total"
                );
                budget_exhausted = true;
                break;
            }

            calls += 1;
            match self.fetch_changelog_page(issue_key, retrieved, cancel).await {
                Ok(page) => {
                    if page.histories.is_empty() {
                        break;
                    }
                    retrieved += page.histories.len() as u32;
                    total = total.max(page.total);
                    page_size = page_size.min(page_size_of(&page));
                    exhausted = page.is_last == Some(true);
                    pages.push(page);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        issue_key,
                        start_at = retrieved,
                        error = %e,
                        "failed to fetch changelog page, keeping partial history"
                    );
                    continuation_error = Some(e);
                    break;
                }
            }
        }

        Ok(HistoryPageSet {
            issue,
            pages,
            total,
            retrieved,
            budget_exhausted,
            continuation_error,
        })
    }
}

/// ページが実際に返した件数（`maxResults` を超えない、最低1）
fn page_size_of(page: &ChangelogPage) -> u32 {
    let returned = page.histories.len() as u32;
    let size = if page.max_results > 0 {
        page.max_results.min(returned)
    } else {
        returned
    };
    size.max(1)
}

/// `ceil(total / page_size) + 1` を上限 `max_pages` で切り詰める
fn call_budget(total: u32, page_size: u32, max_pages: u32) -> u32 {
    let pages = total.div_ceil(page_size.max(1));
    pages.saturating_add(1).min(max_pages)
}
