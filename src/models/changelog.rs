use serde::{Deserialize, Serialize};

use super::User;

/// 変更履歴の1ページ
///
/// `expand=changelog` で課題に埋め込まれる形と、`/issue/{key}/changelog`
/// の単独レスポンスの両方をこの型で受ける。Cloudの単独レスポンスは
/// `histories` ではなく `values` に履歴を入れて返す。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangelogPage {
    #[serde(rename = "startAt", default)]
    pub start_at: u32,
    #[serde(rename = "maxResults", default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default, alias = "values")]
    pub histories: Vec<HistoryEntry>,
    #[serde(rename = "isLast", default, skip_serializing_if = "Option::is_none")]
    pub is_last: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    /// 変更日時（書式はインスタンスにより異なる）
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub items: Vec<FieldChangeItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChangeItem {
    pub field: String,
    #[serde(rename = "fieldtype", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(rename = "fieldId", default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "fromString", default, skip_serializing_if = "Option::is_none")]
    pub from_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(rename = "toString", default, skip_serializing_if = "Option::is_none")]
    pub to_string: Option<String>,
}

impl FieldChangeItem {
    pub fn is_status(&self) -> bool {
        self.field == "status"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_changelog_deserialization() {
        let json_data = json!({
            "startAt": 0,
            "maxResults": 2,
            "total": 5,
            "histories": [
                {
                    "id": "12345",
                    "author": {
                        "name": "jdoe",
                        "displayName": "John Doe",
                        "emailAddress": "jdoe@example.com"
                    },
                    "created": "2024-01-15T10:30:00.000+0000",
                    "items": [
                        {
                            "field": "status",
                            "fieldtype": "jira",
                            "from": "1",
                            "fromString": "Open",
                            "to": "3",
                            "toString": "In Progress"
                        },
                        {
                            "field": "assignee",
                            "fieldtype": "jira",
                            "from": null,
                            "fromString": null,
                            "to": "jdoe",
                            "toString": "John Doe"
                        }
                    ]
                },
                {
                    "id": "12346",
                    "author": null,
                    "created": "2024-01-16T10:30:00.000+0000",
                    "items": []
                }
            ]
        });

        let page: ChangelogPage = serde_json::from_value(json_data).unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.histories.len(), 2);

        let first = &page.histories[0];
        assert_eq!(first.author.as_ref().unwrap().login(), Some("jdoe"));
        assert!(first.items[0].is_status());
        assert_eq!(first.items[0].from_string.as_deref(), Some("Open"));
        assert_eq!(first.items[0].to_string.as_deref(), Some("In Progress"));
        assert!(!first.items[1].is_status());
        assert!(first.items[1].from_string.is_none());
        assert!(page.histories[1].author.is_none());
    }

    #[test]
    fn test_cloud_changelog_values_alias() {
        let json_data = json!({
            "self": "https://example.atlassian.net/rest/api/3/issue/TEST-1/changelog?startAt=100",
            "startAt": 100,
            "maxResults": 100,
            "total": 101,
            "isLast": true,
            "values": [
                {
                    "id": "20001",
                    "created": "2024-02-01T09:00:00.000+0000",
                    "items": [{ "field": "status", "fromString": "Review", "toString": "Done" }]
                }
            ]
        });

        let page: ChangelogPage = serde_json::from_value(json_data).unwrap();

        assert_eq!(page.histories.len(), 1);
        assert_eq!(page.is_last, Some(true));
        assert_eq!(page.start_at, 100);
    }
}
