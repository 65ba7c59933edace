use owo_colors::OwoColorize;
use plugin_market::install::{InstallOutcome, Notice, NoticeKind};
use plugin_market::market::ActionStatus;

pub struct CommandSummary {
    pub prefix: String,
    pub message: String,
}

impl CommandSummary {
    pub fn format(success: usize, failure: usize) -> Self {
        match (success, failure) {
            (_, f) if f > 0 => Self {
                prefix: "✗".red().to_string(),
                message: format!("{} succeeded, {} failed", success.green(), f.red()),
            },
            (s, _) if s > 0 => Self {
                prefix: "✓".green().to_string(),
                message: format!("{} plugin(s) installed", s.green()),
            },
            _ => Self {
                prefix: "•".yellow().to_string(),
                message: "Nothing to install".to_string(),
            },
        }
    }
}

/// 操作状態の色付きラベル
pub fn action_label(status: ActionStatus) -> String {
    match status {
        ActionStatus::Download => status.as_str().cyan().to_string(),
        ActionStatus::Upgrade => status.as_str().yellow().to_string(),
        ActionStatus::Installed => status.as_str().green().to_string(),
        ActionStatus::Downloading => status.as_str().blue().to_string(),
        ActionStatus::PendingRestart => "Restart required".magenta().to_string(),
    }
}

/// 通知を 1 行に整形
pub fn notice_line(notice: &Notice) -> String {
    let prefix = match notice.kind {
        NoticeKind::Success => "✓".green().to_string(),
        NoticeKind::Warning => "!".yellow().to_string(),
        NoticeKind::Error => "✗".red().to_string(),
    };
    format!("{} {}: {}", prefix, notice.plugin_id.bold(), notice.message)
}

/// 結果を成功・失敗に振り分ける（拒否と更新見送りはどちらにも数えない）
pub fn tally(outcomes: &[InstallOutcome]) -> (usize, usize) {
    outcomes.iter().fold((0, 0), |(ok, ng), outcome| match outcome {
        InstallOutcome::Installed | InstallOutcome::Upgraded { .. } => (ok + 1, ng),
        InstallOutcome::Failed(_) => (ok, ng + 1),
        _ => (ok, ng),
    })
}
