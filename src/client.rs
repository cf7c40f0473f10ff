use crate::error::{Error, Result};
use base64::Engine;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// リクエストタイムアウトの既定値
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, api_token: String },
    Bearer { token: String },
}

/// 接続先JIRAの種別（APIの方言を決める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallationType {
    /// Atlassian Cloud（`/rest/api/3`、境界付きJQL必須）
    #[default]
    Cloud,
    /// Server / Data Center（`/rest/api/2`、オフセットページング）
    Local,
}

impl InstallationType {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cloud" => Ok(InstallationType::Cloud),
            "local" | "server" => Ok(InstallationType::Local),
            other => Err(Error::InvalidConfiguration(format!(
                "Unknown installation type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub auth: Auth,
    pub installation_type: InstallationType,
    pub timeout: Duration,
}

impl JiraConfig {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        let base_url = base_url.into();

        // Validate URL
        let _ = Url::parse(&base_url)
            .map_err(|_| Error::InvalidConfiguration("Invalid base URL".to_string()))?;

        match &auth {
            Auth::Basic { username, api_token } => {
                if username.trim().is_empty() {
                    return Err(Error::InvalidConfiguration("login is required".to_string()));
                }
                if api_token.is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "API token is required".to_string(),
                    ));
                }
            }
            Auth::Bearer { token } => {
                if token.is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "API token is required".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            installation_type: InstallationType::default(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// 接続先の種別を設定
    pub fn installation_type(mut self, installation_type: InstallationType) -> Self {
        self.installation_type = installation_type;
        self
    }

    /// リクエストタイムアウトを設定
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `.env` と環境変数から設定を読み込む
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意のキー参照関数から設定を組み立てる
    ///
    /// 参照するキーは `JIRA_URL`, `JIRA_USER`, `JIRA_API_TOKEN`,
    /// `JIRA_AUTH_TYPE`, `JIRA_INSTALLATION_TYPE`, `JIRA_TIMEOUT_SECS`。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| {
            lookup(name).filter(|v| !v.is_empty()).ok_or_else(|| {
                Error::ConfigurationMissing(format!("{} not found in environment", name))
            })
        };

        let base_url = require("JIRA_URL")?;
        let api_token = require("JIRA_API_TOKEN")?;

        let auth_type = lookup("JIRA_AUTH_TYPE").map(|v| v.trim().to_ascii_lowercase());
        let auth = match auth_type.as_deref() {
            None | Some("") | Some("basic") => Auth::Basic {
                username: require("JIRA_USER")?,
                api_token,
            },
            Some("bearer") => Auth::Bearer { token: api_token },
            Some(other) => {
                return Err(Error::InvalidConfiguration(format!(
                    "Unsupported auth type: {}",
                    other
                )));
            }
        };

        let installation_type = lookup("JIRA_INSTALLATION_TYPE")
            .map(|v| InstallationType::parse(&v))
            .transpose()?
            .unwrap_or_default();

        let timeout = lookup("JIRA_TIMEOUT_SECS")
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| {
                    Error::InvalidConfiguration(format!(
                        "JIRA_TIMEOUT_SECS must be a number of seconds: {}",
                        v
                    ))
                })
            })
            .transpose()?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self::new(base_url, auth)?
            .installation_type(installation_type)
            .timeout(timeout))
    }
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub(crate) client: Client,
    pub(crate) config: Arc<JiraConfig>,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        // 認証ヘッダーを追加
        let auth_value = match &config.auth {
            Auth::Basic { username, api_token } => {
                let credentials = format!("{}:{}", username, api_token);
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
                format!("Basic {}", encoded)
            }
            Auth::Bearer { token } => format!("Bearer {}", token),
        };
        let mut auth_header = header::HeaderValue::from_str(&auth_value)
            .map_err(|_| Error::InvalidConfiguration("Invalid auth header".to_string()))?;
        auth_header.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_header);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    /// GETリクエストを送り、JSONボディをデコードする
    ///
    /// `operation` はエラーメッセージとログに使う操作名。トークンが
    /// キャンセルされると送信中のリクエストも破棄して `Error::Cancelled` を返す。
    pub async fn get_json<T>(
        &self,
        endpoint: &str,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.get(endpoint, operation) => result,
        }
    }

    async fn get<T>(&self, endpoint: &str, operation: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, endpoint);
        tracing::debug!(method = "GET", %url, operation, "sending request");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        decode_body(&body, operation)
    }
}

/// レスポンスボディをデコードする（空ボディは `EmptyResponse`）
pub(crate) fn decode_body<T>(body: &str, operation: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(Error::EmptyResponse(operation.to_string()));
    }

    serde_json::from_str(trimmed).map_err(|source| Error::Decode {
        context: operation.to_string(),
        source,
    })
}
