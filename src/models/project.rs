use serde::{Deserialize, Serialize};

/// 課題に埋め込まれるプロジェクト参照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
