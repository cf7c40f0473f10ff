use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{ChangelogPage, IssueType, Priority, Project, Status, User};
use crate::timestamp::parse_jira_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    #[serde(default)]
    pub fields: IssueFields,
    /// `expand=changelog` 指定時のみ埋め込まれる最初の履歴ページ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<ChangelogPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(rename = "issuetype", default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<IssueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    // 日時はインスタンスによって書式が異なるため文字列のまま保持する
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    // カスタムフィールドは動的に追加
    #[serde(flatten)]
    pub custom_fields: HashMap<String, serde_json::Value>,
}

impl Issue {
    /// 現在のステータス名
    pub fn status_name(&self) -> Option<&str> {
        self.fields.status.as_ref().map(|s| s.name.as_str())
    }

    /// 作成日時（解析できない場合は `None`）
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.fields.created.as_deref().and_then(parse_jira_timestamp)
    }

    /// 更新日時（解析できない場合は `None`）
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.fields.updated.as_deref().and_then(parse_jira_timestamp)
    }

    /// プロジェクトキー（課題キーの接頭辞から推定する）
    pub fn project_key(&self) -> Option<&str> {
        match &self.fields.project {
            Some(project) => Some(project.key.as_str()),
            None => self.key.rsplit_once('-').map(|(prefix, _)| prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_issue_deserialization() {
        let json_data = json!({
            "id": "10000",
            "key": "TEST-1",
            "self": "https://example.atlassian.net/rest/api/3/issue/10000",
            "fields": {
                "summary": "Test Issue",
                "description": "This is a test issue",
                "issuetype": {
                    "id": "1",
                    "name": "Bug",
                    "subtask": false
                },
                "priority": {
                    "id": "3",
                    "name": "Medium"
                },
                "status": {
                    "id": "1",
                    "name": "To Do",
                    "statusCategory": {
                        "id": 2,
                        "key": "new",
                        "name": "To Do",
                        "colorName": "blue-gray"
                    }
                },
                "assignee": null,
                "reporter": {
                    "accountId": "557058:f58131cb",
                    "displayName": "Test User"
                },
                "labels": ["backend"],
                "created": "2024-01-01T00:00:00.000+0000",
                "updated": "2024-01-02T00:00:00.000Z",
                "customfield_10001": "Custom Value"
            }
        });

        let issue: Issue = serde_json::from_value(json_data).unwrap();

        assert_eq!(issue.id, "10000");
        assert_eq!(issue.key, "TEST-1");
        assert_eq!(issue.status_name(), Some("To Do"));
        assert!(issue.fields.assignee.is_none());
        assert_eq!(issue.fields.labels, Some(vec!["backend".to_string()]));
        assert_eq!(
            issue.created_at(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            issue.updated_at(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            issue.fields.custom_fields.get("customfield_10001").unwrap(),
            "Custom Value"
        );
        assert_eq!(
            issue.fields.custom_fields.get("description").unwrap(),
            "This is a test issue"
        );
        assert!(issue.changelog.is_none());
    }

    #[test]
    fn test_minimal_issue_from_legacy_search() {
        // fieldsを指定しない旧APIの検索結果は最小限の形になることがある
        let issue: Issue = serde_json::from_value(json!({ "key": "OPS-42" })).unwrap();

        assert_eq!(issue.key, "OPS-42");
        assert_eq!(issue.status_name(), None);
        assert_eq!(issue.created_at(), None);
        assert_eq!(issue.project_key(), Some("OPS"));
    }

    #[test]
    fn test_project_key_prefers_project_field() {
        let issue: Issue = serde_json::from_value(json!({
            "key": "OPS-42",
            "fields": { "project": { "key": "OPERATIONS" } }
        }))
        .unwrap();

        assert_eq!(issue.project_key(), Some("OPERATIONS"));
    }
}
