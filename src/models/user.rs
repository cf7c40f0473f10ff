use serde::{Deserialize, Serialize};

/// CloudとServerの両方のユーザー表現を受け付ける
///
/// Cloudは `accountId`、Serverは `name` / `key` でユーザーを識別する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "accountId", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "emailAddress", default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl User {
    /// ログイン名（Serverの `name`、なければCloudの `accountId`）
    pub fn login(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.account_id.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// 表示用の名前
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.login())
            .unwrap_or("Unknown")
    }
}
