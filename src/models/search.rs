use super::Issue;
use serde::{Deserialize, Serialize};

/// 検索結果の総件数
///
/// 新しい検索APIは総件数を返さないことがあるため、確定値・下限値・不明の
/// 3状態で扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchTotal {
    /// サーバーが示した、または最終ページから確定した総件数
    Exact(u32),
    /// 少なくともこの件数は存在する（さらに続く可能性がある）
    AtLeast(u32),
    /// 手がかりがない
    Unknown,
}

impl SearchTotal {
    pub fn is_exact(&self) -> bool {
        matches!(self, SearchTotal::Exact(_))
    }

    /// `retrieved` 件目まで取得した時点で全件を取り終えたか
    ///
    /// 総件数が確定していない場合は常に `false`。
    pub fn is_exhausted_at(&self, retrieved: u32) -> bool {
        matches!(self, SearchTotal::Exact(n) if retrieved >= *n)
    }
}

/// 検索エンドポイントの生レスポンス（両方言共通）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "startAt", default)]
    pub start_at: u32,

    #[serde(rename = "maxResults", default)]
    pub max_results: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    #[serde(default)]
    pub issues: Vec<Issue>,

    #[serde(rename = "nextPageToken", default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    #[serde(rename = "isLast", default, skip_serializing_if = "Option::is_none")]
    pub is_last: Option<bool>,
}

/// 1回の検索呼び出しの結果
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub issues: Vec<Issue>,
    pub start_at: u32,
    pub max_results: u32,
    pub total: SearchTotal,
    pub next_page_token: Option<String>,
}

impl SearchPage {
    /// 境界付き検索（新API）のレスポンスから組み立てる
    ///
    /// 総件数が欠けている・0の場合は `isLast` と取得件数から推定する。
    pub fn from_bounded_response(response: SearchResponse, start_at: u32, max_results: u32) -> Self {
        let returned = response.issues.len() as u32;
        let end = start_at.saturating_add(returned);
        let is_last = response.is_last.unwrap_or(false);

        let total = match response.total {
            Some(n) if n > 0 => SearchTotal::Exact(n),
            _ if returned > 0 && is_last => SearchTotal::Exact(end),
            _ if returned > 0 => SearchTotal::AtLeast(end),
            Some(0) => SearchTotal::Exact(start_at),
            _ if is_last => SearchTotal::Exact(start_at),
            _ => SearchTotal::Unknown,
        };

        Self {
            start_at,
            max_results: effective_max_results(response.max_results, max_results),
            total,
            next_page_token: response.next_page_token,
            issues: response.issues,
        }
    }

    /// オフセット方式（旧API）のレスポンスから組み立てる。総件数は常に確定値。
    pub fn from_offset_response(response: SearchResponse, start_at: u32, max_results: u32) -> Self {
        let end = start_at.saturating_add(response.issues.len() as u32);

        Self {
            start_at,
            max_results: effective_max_results(response.max_results, max_results),
            total: SearchTotal::Exact(response.total.unwrap_or(end)),
            next_page_token: response.next_page_token,
            issues: response.issues,
        }
    }

    /// このページの末尾オフセット
    pub fn end_offset(&self) -> u32 {
        self.start_at.saturating_add(self.issues.len() as u32)
    }

    /// これ以上ページが存在しないと判断できるか
    ///
    /// 総件数が確定していればそれで判定し、そうでなければ「0件」または
    /// 「要求件数に満たない」ことを終端の合図とする。
    pub fn is_final(&self, requested: u32) -> bool {
        if self.issues.is_empty() {
            return true;
        }
        if self.total.is_exact() {
            self.total.is_exhausted_at(self.end_offset())
        } else {
            (self.issues.len() as u32) < requested
        }
    }
}

fn effective_max_results(reported: u32, requested: u32) -> u32 {
    if reported > 0 { reported } else { requested }
}
