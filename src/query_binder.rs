use std::fmt;
use std::sync::Arc;

/// 境界条件がないJQLに付与する既定の条件（直近90日に作成）
pub const DEFAULT_BOUND: &str = "created >= -90d";

/// 境界条件とみなす語句（小文字で比較する）
const DEFAULT_BOUNDING_TERMS: &[&str] = &[
    "created >=", "created >", "created =", "created <=", "created <",
    "updated >=", "updated >", "updated =", "updated <=", "updated <",
    "project =", "project in",
    "id =", "id in",
    "key =", "key in",
    "issuekey =", "issuekey in",
];

/// JQLが境界付きかどうかを判定する1つの規則
#[derive(Clone)]
pub enum BoundingMatcher {
    /// 大文字小文字を無視した部分一致
    Contains(String),
    /// 任意の判定関数（JQL全体を受け取る）
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl BoundingMatcher {
    pub fn contains(term: impl Into<String>) -> Self {
        BoundingMatcher::Contains(term.into().to_lowercase())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        BoundingMatcher::Predicate(Arc::new(f))
    }

    fn matches(&self, jql: &str, jql_lower: &str) -> bool {
        match self {
            BoundingMatcher::Contains(term) => jql_lower.contains(term.as_str()),
            BoundingMatcher::Predicate(f) => f(jql),
        }
    }
}

impl fmt::Debug for BoundingMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundingMatcher::Contains(term) => f.debug_tuple("Contains").field(term).finish(),
            BoundingMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// 新APIが要求する「境界付きJQL」を保証する
///
/// 判定は語彙に対する部分一致のみで、JQLの構文解析は行わない。カスタム
/// フィールドだけで絞り込んだクエリなどは境界なしと判定される。
#[derive(Debug, Clone)]
pub struct QueryBinder {
    matchers: Vec<BoundingMatcher>,
    default_bound: String,
}

impl QueryBinder {
    /// 既定の語彙と既定の境界条件で作成
    pub fn new() -> Self {
        Self {
            matchers: DEFAULT_BOUNDING_TERMS
                .iter()
                .map(|term| BoundingMatcher::contains(*term))
                .collect(),
            default_bound: DEFAULT_BOUND.to_string(),
        }
    }

    /// 判定規則を追加
    pub fn with_matcher(mut self, matcher: BoundingMatcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// 境界条件がない場合に付与する条件を設定
    pub fn default_bound(mut self, bound: impl Into<String>) -> Self {
        self.default_bound = bound.into();
        self
    }

    pub fn matchers(&self) -> &[BoundingMatcher] {
        &self.matchers
    }

    /// JQLの絞り込み部分に境界条件が含まれているか
    pub fn is_bounded(&self, jql: &str) -> bool {
        let (filter, _) = split_order_by(jql);
        let lower = filter.to_lowercase();
        self.matchers.iter().any(|m| m.matches(filter, &lower))
    }

    /// 境界条件がなければ既定の条件をANDで前置する
    ///
    /// 末尾の `ORDER BY` 句は括弧の外に残す。
    pub fn bind(&self, jql: &str) -> String {
        if self.is_bounded(jql) {
            return jql.to_string();
        }

        let (filter, order_by) = split_order_by(jql);
        let mut bound = if filter.is_empty() {
            self.default_bound.clone()
        } else {
            format!("{} AND ({})", self.default_bound, filter)
        };

        if !order_by.is_empty() {
            bound.push(' ');
            bound.push_str(order_by);
        }
        bound
    }
}

impl Default for QueryBinder {
    fn default() -> Self {
        Self::new()
    }
}

/// JQLを絞り込み部分と `ORDER BY` 句に分ける
fn split_order_by(jql: &str) -> (&str, &str) {
    match find_order_by(jql) {
        Some(idx) => (jql[..idx].trim(), jql[idx..].trim()),
        None => (jql.trim(), ""),
    }
}

/// 引用符の外にある最後の `ORDER BY` の開始位置
fn find_order_by(jql: &str) -> Option<usize> {
    let bytes = jql.as_bytes();
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut found = None;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'o' | b'O' if is_order_by_at(bytes, i) => found = Some(i),
            _ => {}
        }
    }
    found
}

/// `i` から語として `ORDER <空白> BY` が始まるか
fn is_order_by_at(bytes: &[u8], i: usize) -> bool {
    if i > 0 && !(bytes[i - 1].is_ascii_whitespace() || bytes[i - 1] == b')') {
        return false;
    }
    let rest = &bytes[i..];
    if rest.len() < 5 || !rest[..5].eq_ignore_ascii_case(b"order") {
        return false;
    }
    let after_order = &rest[5..];
    let gap = after_order
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    if gap == 0 {
        return false;
    }
    let after_gap = &after_order[gap..];
    after_gap.len() >= 2
        && after_gap[..2].eq_ignore_ascii_case(b"by")
        && after_gap.get(2).is_none_or(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_empty_query() {
        let binder = QueryBinder::new();

        assert_eq!(binder.bind(""), "created >= -90d");
        assert_eq!(binder.bind("   "), "created >= -90d");
    }

    #[test]
    fn test_bind_unbounded_query_wraps_in_parentheses() {
        let binder = QueryBinder::new();

        assert_eq!(
            binder.bind("assignee = bob"),
            "created >= -90d AND (assignee = bob)"
        );
        assert_eq!(
            binder.bind("status = Open OR priority = High"),
            "created >= -90d AND (status = Open OR priority = High)"
        );
    }

    #[test]
    fn test_bind_is_idempotent() {
        let binder = QueryBinder::new();

        for jql in ["", "assignee = bob", "labels = urgent ORDER BY created DESC"] {
            let once = binder.bind(jql);
            assert_eq!(binder.bind(&once), once, "double-bound: {}", jql);
        }
    }

    #[test]
    fn test_bounded_queries_are_unchanged() {
        let binder = QueryBinder::new();

        for jql in [
            "project = PROJ",
            "PROJECT IN (A, B)",
            "created >= -7d",
            "Updated < '2024-01-01'",
            "key in (PROJ-1, PROJ-2)",
            "issuekey = PROJ-1",
            "id = 10000",
        ] {
            assert!(binder.is_bounded(jql), "expected bounded: {}", jql);
            assert_eq!(binder.bind(jql), jql);
        }
    }

    #[test]
    fn test_order_by_clause_stays_outside_parentheses() {
        let binder = QueryBinder::new();

        assert_eq!(
            binder.bind("assignee = bob ORDER BY created DESC"),
            "created >= -90d AND (assignee = bob) ORDER BY created DESC"
        );
        assert_eq!(
            binder.bind("ORDER BY created DESC"),
            "created >= -90d ORDER BY created DESC"
        );
    }

    #[test]
    fn test_order_by_inside_quoted_text_is_part_of_filter() {
        let binder = QueryBinder::new();

        // Given: 引用符内に "order by" を含むJQL
        // Then: 絞り込み部分としてそのまま括弧に入る
        assert_eq!(
            binder.bind(r#"summary ~ "sort order by date""#),
            r#"created >= -90d AND (summary ~ "sort order by date")"#
        );
        assert_eq!(
            binder.bind("summary ~ 'order by' ORDER BY created DESC"),
            "created >= -90d AND (summary ~ 'order by') ORDER BY created DESC"
        );
        assert_eq!(
            binder.bind(r#"summary ~ "say \"order by\" now" order  by rank"#),
            r#"created >= -90d AND (summary ~ "say \"order by\" now") order  by rank"#
        );
    }

    #[test]
    fn test_order_by_must_be_whole_words() {
        assert_eq!(split_order_by("labels = reorder"), ("labels = reorder", ""));
        assert_eq!(split_order_by("labels = border by"), ("labels = border by", ""));
        assert_eq!(split_order_by("labels = x ORDER BYrank"), ("labels = x ORDER BYrank", ""));
        assert_eq!(
            split_order_by("(labels = x)ORDER BY rank"),
            ("(labels = x)", "ORDER BY rank")
        );
    }

    #[test]
    fn test_custom_field_restriction_is_a_known_false_negative() {
        let binder = QueryBinder::new();

        assert!(!binder.is_bounded("cf[10010] = 42"));
    }

    #[test]
    fn test_custom_matchers_extend_vocabulary() {
        let binder = QueryBinder::new()
            .with_matcher(BoundingMatcher::contains("Sprint IN"))
            .with_matcher(BoundingMatcher::predicate(|jql| jql.contains("cf[10010]")));

        assert!(binder.is_bounded("sprint in openSprints()"));
        assert!(binder.is_bounded("cf[10010] = 42"));
        assert_eq!(binder.matchers().len(), DEFAULT_BOUNDING_TERMS.len() + 2);
    }

    #[test]
    fn test_custom_default_bound() {
        let binder = QueryBinder::new().default_bound("updated >= -30d");

        assert_eq!(binder.bind(""), "updated >= -30d");
        assert_eq!(binder.bind("assignee = bob"), "updated >= -30d AND (assignee = bob)");
    }
}
