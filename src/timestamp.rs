use chrono::{DateTime, Utc};

/// JIRAの変更履歴で使われる、コロンなしオフセット付きミリ秒精度の書式
/// （例: `2024-01-05T10:00:00.000+0000`）
pub const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// JIRAの日時文字列を`DateTime<Utc>`にパース
///
/// RFC 3339 を先に試し、失敗したら [`JIRA_TIMESTAMP_FORMAT`] で再試行する。
pub fn parse_jira_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, JIRA_TIMESTAMP_FORMAT))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 日時をパースし、どちらの書式でも読めなければ現在時刻で代用する
///
/// 1件の不正な日時で再構築全体を失敗させないための最終手段。代用した場合は
/// 警告ログを出す。
pub fn parse_timestamp_or_now(raw: &str) -> DateTime<Utc> {
    match parse_jira_timestamp(raw) {
        Some(timestamp) => timestamp,
        None => {
            tracing::warn!(raw, "unparseable changelog timestamp, substituting current time");
            Utc::now()
        }
    }
}
