use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChangelogPage, Issue, User};
use crate::timestamp::{parse_jira_timestamp, parse_timestamp_or_now};

/// 1回のステータス遷移
///
/// `from_status` が空文字列のものは、課題作成時点の初期ステータスを表す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub timestamp: DateTime<Utc>,
    pub author: Option<User>,
    pub from_status: String,
    pub to_status: String,
}

impl StatusChange {
    pub fn is_creation(&self) -> bool {
        self.from_status.is_empty()
    }

    pub fn author_label(&self) -> &str {
        self.author.as_ref().map(User::label).unwrap_or("Unknown")
    }
}

/// 変更履歴ページからステータス遷移の時系列を組み立てる
///
/// 結果は時刻の昇順。最も古い遷移の遷移元が分かり、課題の作成日時が
/// 読める場合は、作成時点の初期ステータスを先頭に補う。
pub fn reconstruct(issue: &Issue, pages: &[ChangelogPage]) -> Vec<StatusChange> {
    let mut changes: Vec<StatusChange> = pages
        .iter()
        .flat_map(|page| page.histories.iter())
        .flat_map(|entry| {
            entry
                .items
                .iter()
                .filter(|item| item.is_status())
                .map(move |item| StatusChange {
                    timestamp: parse_timestamp_or_now(&entry.created),
                    author: entry.author.clone(),
                    from_status: item.from_string.clone().unwrap_or_default(),
                    to_status: item.to_string.clone().unwrap_or_default(),
                })
        })
        .collect();

    // 発見順（新しい順）を反転してから時刻で安定ソート
    changes.reverse();
    changes.sort_by_key(|change| change.timestamp);

    if let Some(initial) = initial_status(issue, &changes) {
        changes.insert(0, initial);
    }
    changes
}

fn initial_status(issue: &Issue, changes: &[StatusChange]) -> Option<StatusChange> {
    let earliest = changes.first()?;
    if earliest.from_status.is_empty() {
        return None;
    }
    let created = issue
        .fields
        .created
        .as_deref()
        .and_then(parse_jira_timestamp)?;

    Some(StatusChange {
        timestamp: created,
        author: issue.fields.reporter.clone(),
        from_status: String::new(),
        to_status: earliest.from_status.clone(),
    })
}
