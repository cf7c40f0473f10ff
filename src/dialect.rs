use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::{InstallationType, JiraClient};
use crate::error::Result;
use crate::models::{ChangelogPage, Issue, SearchPage, SearchResponse};
use crate::query_binder::QueryBinder;

/// Cloud（新API）のパス接頭辞
pub const CLOUD_API_PREFIX: &str = "/rest/api/3";
/// Server / Data Center（旧API）のパス接頭辞
pub const SERVER_API_PREFIX: &str = "/rest/api/2";

/// APIの方言ごとの差異を吸収する抽象化トレイト
///
/// 検索・課題取得・変更履歴ページ取得の3操作を提供する。実装は構築時に
/// 注入され、呼び出し側は方言を意識しない。
#[async_trait]
pub trait ApiDialect: Send + Sync {
    /// ログ用の方言名
    fn name(&self) -> &'static str;

    /// JQLで課題を1ページ検索
    async fn search(
        &self,
        jql: &str,
        start_at: u32,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchPage>;

    /// 変更履歴の最初のページを埋め込んだ課題を取得
    async fn fetch_issue(&self, issue_key: &str, cancel: &CancellationToken) -> Result<Issue>;

    /// 変更履歴の続きのページを取得
    async fn fetch_changelog_page(
        &self,
        issue_key: &str,
        start_at: u32,
        cancel: &CancellationToken,
    ) -> Result<ChangelogPage>;
}

impl InstallationType {
    /// 接続先の種別に対応する方言を作成
    pub fn dialect(self, client: JiraClient) -> Arc<dyn ApiDialect> {
        match self {
            InstallationType::Cloud => Arc::new(CloudDialect::new(client)),
            InstallationType::Local => Arc::new(ServerDialect::new(client)),
        }
    }
}

/// クライアント設定の `installation_type` に従って方言を選ぶ
pub fn dialect_for(client: JiraClient) -> Arc<dyn ApiDialect> {
    let installation_type = client.config().installation_type;
    installation_type.dialect(client)
}

fn issue_endpoint(prefix: &str, issue_key: &str) -> String {
    format!(
        "{}/issue/{}?expand=changelog",
        prefix,
        urlencoding::encode(issue_key)
    )
}

fn changelog_endpoint(prefix: &str, issue_key: &str, start_at: u32) -> String {
    format!(
        "{}/issue/{}/changelog?startAt={}",
        prefix,
        urlencoding::encode(issue_key),
        start_at
    )
}

/// Cloud向けの方言。検索前にJQLへ境界条件を補う。
#[derive(Debug, Clone)]
pub struct CloudDialect {
    client: JiraClient,
    binder: QueryBinder,
}

impl CloudDialect {
    pub fn new(client: JiraClient) -> Self {
        Self::with_binder(client, QueryBinder::new())
    }

    pub fn with_binder(client: JiraClient, binder: QueryBinder) -> Self {
        Self { client, binder }
    }

    pub fn binder(&self) -> &QueryBinder {
        &self.binder
    }
}

#[async_trait]
impl ApiDialect for CloudDialect {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn search(
        &self,
        jql: &str,
        start_at: u32,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchPage> {
        let bound_jql = self.binder.bind(jql);
        if bound_jql != jql {
            tracing::debug!(original = jql, bound = %bound_jql, "added default bound to JQL");
        }

        let endpoint = format!(
            "{}/search/jql?jql={}&startAt={}&maxResults={}&fields=*all",
            CLOUD_API_PREFIX,
            urlencoding::encode(&bound_jql),
            start_at,
            max_results
        );
        let response: SearchResponse = self.client.get_json(&endpoint, "search", cancel).await?;

        Ok(SearchPage::from_bounded_response(response, start_at, max_results))
    }

    async fn fetch_issue(&self, issue_key: &str, cancel: &CancellationToken) -> Result<Issue> {
        let endpoint = issue_endpoint(CLOUD_API_PREFIX, issue_key);
        self.client
            .get_json(&endpoint, &format!("issue {} with changelog", issue_key), cancel)
            .await
    }

    async fn fetch_changelog_page(
        &self,
        issue_key: &str,
        start_at: u32,
        cancel: &CancellationToken,
    ) -> Result<ChangelogPage> {
        let endpoint = changelog_endpoint(CLOUD_API_PREFIX, issue_key, start_at);
        self.client
            .get_json(&endpoint, &format!("changelog of {}", issue_key), cancel)
            .await
    }
}

/// Server / Data Center向けの方言。JQLはそのまま渡す。
#[derive(Debug, Clone)]
pub struct ServerDialect {
    client: JiraClient,
}

impl ServerDialect {
    pub fn new(client: JiraClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ApiDialect for ServerDialect {
    fn name(&self) -> &'static str {
        "server"
    }

    async fn search(
        &self,
        jql: &str,
        start_at: u32,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<SearchPage> {
        let endpoint = format!(
            "{}/search?jql={}&startAt={}&maxResults={}",
            SERVER_API_PREFIX,
            urlencoding::encode(jql),
            start_at,
            max_results
        );
        let response: SearchResponse = self.client.get_json(&endpoint, "search", cancel).await?;

        Ok(SearchPage::from_offset_response(response, start_at, max_results))
    }

    async fn fetch_issue(&self, issue_key: &str, cancel: &CancellationToken) -> Result<Issue> {
        let endpoint = issue_endpoint(SERVER_API_PREFIX, issue_key);
        self.client
            .get_json(&endpoint, &format!("issue {} with changelog", issue_key), cancel)
            .await
    }

    async fn fetch_changelog_page(
        &self,
        issue_key: &str,
        start_at: u32,
        cancel: &CancellationToken,
    ) -> Result<ChangelogPage> {
        let endpoint = changelog_endpoint(SERVER_API_PREFIX, issue_key, start_at);
        self.client
            .get_json(&endpoint, &format!("changelog of {}", issue_key), cancel)
            .await
    }
}
