/// ステータス遷移の追跡と滞在時間の集計
///
/// 直近N日に作成された課題の履歴を取得し、ステータスごとの平均滞在時間と
/// 遷移回数を表示します。Ctrl-Cで中断できます。
///
/// 実行前に環境変数を設定してください：
/// export JIRA_URL=https://your-instance.atlassian.net
/// export JIRA_USER=your-email@example.com
/// export JIRA_API_TOKEN=your-api-token
/// export JIRA_INSTALLATION_TYPE=cloud   # または local
///
/// 実行方法：
/// cargo run --example status_tracking -- PROJ 30
use chrono::Utc;
use dotenv::dotenv;
use jira_timeline::{
    ApiDialect, CancellationToken, HistoryConfig, HistoryService, IssueSearch, JiraClient, JiraConfig,
    StatusDurationSummary, TransitionStats, dialect_for,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let project = args.next();
    let days: u32 = args.next().and_then(|d| d.parse().ok()).unwrap_or(30);

    let config = JiraConfig::from_env()
        .map_err(|e| format!("環境変数が設定されていません: {}", e))?;
    let client = JiraClient::new(config)?;
    let dialect = dialect_for(client);
    println!("✅ JIRAクライアント準備完了 ({})", dialect.name());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    // 1. 課題の検索
    let search = IssueSearch::new(dialect.clone());
    let issues = search
        .recent_issues(days, project.as_deref(), &cancel)
        .await?;
    println!("\n📋 直近{}日の課題: {}件", days, issues.len());

    // 2. 履歴の取得
    let keys: Vec<String> = issues.iter().map(|issue| issue.key.clone()).collect();
    let service = HistoryService::with_config(dialect, HistoryConfig::new().concurrency(4));
    let report = service.status_changes_for_issues(&keys, &cancel).await;

    for failure in &report.failures {
        println!("⚠️  {}: {}", failure.key, failure.error);
    }

    // 3. 集計
    let now = Utc::now();
    let mut summary = StatusDurationSummary::new();
    let mut stats = TransitionStats::new();
    for timeline in &report.timelines {
        summary.add_timeline(&timeline.changes, now);
        stats.add_changes(&timeline.changes);
        if !timeline.complete {
            println!("⚠️  {}: 履歴の一部のみ取得", timeline.key);
        }
    }

    println!("\n⏱️  ステータス別の平均滞在時間");
    for (status, _) in summary.sorted_by_total() {
        if let Some(average) = summary.average(status) {
            println!(
                "  {:<20} {:>6.1}時間 ({}件)",
                status,
                average.num_minutes() as f64 / 60.0,
                summary.occurrences(status)
            );
        }
    }

    println!("\n🔀 遷移回数");
    let mut transitions: Vec<_> = stats.transition_counts.iter().collect();
    transitions.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (transition, count) in transitions {
        println!("  {:<40} {}", transition, count);
    }

    Ok(())
}
