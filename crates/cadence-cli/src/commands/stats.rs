use cadence_core::stats::TimerStats;
use cadence_core::util::format_clock_with_hours;

use crate::app::App;
use crate::error::CliError;

pub fn run_stats(app: &App, as_json: bool) -> Result<(), CliError> {
    let stats = app.timers.stats();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_stats_lines(stats: &TimerStats) -> Vec<String> {
    vec![
        format!("Active:     {}", stats.active_count),
        format!("Completed:  {}", stats.completed_count),
        format!("Archived:   {}", stats.archived_count),
        format!(
            "Focused:    {} ({}h)",
            format_clock_with_hours(stats.total_elapsed_seconds),
            stats.total_hours
        ),
    ]
}
