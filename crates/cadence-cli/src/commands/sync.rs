use cadence_core::sync::MergeReport;

use crate::app::App;
use crate::error::CliError;

pub async fn run_sync(app: &App) -> Result<(), CliError> {
    if !app.has_remote() {
        return Err(CliError::SyncNotConfigured);
    }
    if app.auth.user_id().is_none() {
        return Err(CliError::NotSignedIn);
    }

    let timers = app.timers.sync().await.ok_or(CliError::SyncFailed)?;
    let notes = app.notes.sync().await.ok_or(CliError::SyncFailed)?;

    println!("{}", format_merge_report("Timers", &timers));
    println!("{}", format_merge_report("Notes", &notes));
    Ok(())
}

pub fn format_merge_report(label: &str, report: &MergeReport) -> String {
    let mut line = format!(
        "{label}: {} adopted, {} updated locally, {} deleted locally, {} uploaded, {} pushed",
        report.adopted, report.overwritten, report.deleted, report.uploaded, report.pushed
    );
    if report.failed > 0 {
        line.push_str(&format!(" ({} remote writes failed)", report.failed));
    }
    if report.rejected > 0 {
        line.push_str(&format!(" ({} invalid remote entries ignored)", report.rejected));
    }
    line
}
