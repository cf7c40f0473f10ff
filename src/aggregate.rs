use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::reconstruct::StatusChange;

/// ステータスごとの滞在時間
///
/// `changes` は古い順であること。i番目の遷移先ステータスには次の遷移までの
/// 時間を、最後の遷移先には `now` までの時間を割り当てる。同じステータスに
/// 複数回滞在した場合は合計する。全値の合計は `now - 最初の遷移時刻` に等しい。
pub fn status_residency(changes: &[StatusChange], now: DateTime<Utc>) -> HashMap<String, Duration> {
    let mut durations: HashMap<String, Duration> = HashMap::new();

    for (i, change) in changes.iter().enumerate() {
        let until = changes.get(i + 1).map_or(now, |next| next.timestamp);
        *durations
            .entry(change.to_status.clone())
            .or_insert_with(Duration::zero) += until - change.timestamp;
    }

    durations
}

/// 複数課題の滞在時間の集計
#[derive(Debug, Clone, Default)]
pub struct StatusDurationSummary {
    totals: HashMap<String, Duration>,
    occurrences: HashMap<String, usize>,
    timelines: usize,
}

impl StatusDurationSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1課題分の時系列を加える
    pub fn add_timeline(&mut self, changes: &[StatusChange], now: DateTime<Utc>) {
        for (status, duration) in status_residency(changes, now) {
            *self.totals.entry(status.clone()).or_insert_with(Duration::zero) += duration;
            *self.occurrences.entry(status).or_insert(0) += 1;
        }
        self.timelines += 1;
    }

    pub fn total(&self, status: &str) -> Option<Duration> {
        self.totals.get(status).copied()
    }

    /// そのステータスを経験した課題1件あたりの平均滞在時間
    pub fn average(&self, status: &str) -> Option<Duration> {
        let total = self.totals.get(status)?;
        let count = *self.occurrences.get(status)?;
        if count == 0 {
            return None;
        }
        Some(*total / count as i32)
    }

    pub fn occurrences(&self, status: &str) -> usize {
        self.occurrences.get(status).copied().unwrap_or(0)
    }

    pub fn timeline_count(&self) -> usize {
        self.timelines
    }

    pub fn totals(&self) -> &HashMap<String, Duration> {
        &self.totals
    }

    /// 合計滞在時間の長い順
    pub fn sorted_by_total(&self) -> Vec<(&str, Duration)> {
        let mut entries: Vec<_> = self
            .totals
            .iter()
            .map(|(status, duration)| (status.as_str(), *duration))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// ステータスと遷移の出現回数
#[derive(Debug, Clone, Default)]
pub struct TransitionStats {
    /// 遷移先ステータスごとの回数
    pub status_counts: HashMap<String, usize>,
    /// `"From → To"` ごとの回数（遷移元が空のものは含めない）
    pub transition_counts: HashMap<String, usize>,
}

impl TransitionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_changes(changes: &[StatusChange]) -> Self {
        let mut stats = Self::new();
        stats.add_changes(changes);
        stats
    }

    pub fn add_changes(&mut self, changes: &[StatusChange]) {
        for change in changes {
            *self.status_counts.entry(change.to_status.clone()).or_insert(0) += 1;

            if !change.from_status.is_empty() {
                let transition = format!("{} → {}", change.from_status, change.to_status);
                *self.transition_counts.entry(transition).or_insert(0) += 1;
            }
        }
    }

    pub fn transition_count(&self, from: &str, to: &str) -> usize {
        self.transition_counts
            .get(&format!("{} → {}", from, to))
            .copied()
            .unwrap_or(0)
    }
}
