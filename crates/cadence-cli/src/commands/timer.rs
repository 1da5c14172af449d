use std::io::{self, Write};
use std::time::Duration;

use cadence_core::alert::{AlertSink, BoundaryAlert};
use cadence_core::models::{TimerDraft, TimerPreset};
use cadence_core::{EntityId, Timer, TimerStatus};
use tokio::time::MissedTickBehavior;

use crate::app::App;
use crate::cli::TimerCommands;
use crate::commands::common::{
    definition_patch, format_progress_line, format_timer_details, format_timer_lines,
    parse_segments, resolve_id, timer_to_list_item, TimerListItem,
};
use crate::error::CliError;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Rings the terminal bell on segment boundaries
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalBell;

impl AlertSink for TerminalBell {
    fn boundary(&self, alert: &BoundaryAlert) {
        println!("\x07\n{}", alert.message());
    }
}

pub async fn run_timer(command: TimerCommands, app: &App) -> Result<(), CliError> {
    match command {
        TimerCommands::Add {
            name,
            description,
            segments,
            repeat,
            preset,
        } => {
            let draft = build_draft(name, description, &segments, repeat, preset.as_deref())?;
            let timer = app.timers.create(draft).await?;
            println!("{}", timer.id);
            Ok(())
        }
        TimerCommands::List { all, json } => run_timer_list(app, all, json),
        TimerCommands::Show { id, json } => {
            let id = resolve_timer(app, &id)?;
            let timer = app.timers.get(&id).ok_or_else(|| not_found(&id))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&timer_to_list_item(&timer))?
                );
            } else {
                for line in format_timer_details(&timer) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        TimerCommands::Edit {
            id,
            name,
            description,
            segments,
            repeat,
        } => {
            let id = resolve_timer(app, &id)?;
            let patch = definition_patch(name, description, &segments, repeat)?;
            let timer = app
                .timers
                .update(&id, patch)
                .await?
                .ok_or_else(|| not_found(&id))?;
            println!("{}", timer.id);
            Ok(())
        }
        TimerCommands::Start { id } => {
            let id = resolve_timer(app, &id)?;
            let timer = app.timers.start(&id).await.ok_or_else(|| not_found(&id))?;
            print_status(&timer);
            if !matches!(timer.status, TimerStatus::Running) {
                println!("Only IDLE or PAUSED timers can be started; reset it first.");
            }
            Ok(())
        }
        TimerCommands::Pause { id } => {
            let id = resolve_timer(app, &id)?;
            match app.timers.pause(&id).await {
                Some(timer) => print_status(&timer),
                None => println!("Timer {id} is not running."),
            }
            Ok(())
        }
        TimerCommands::Reset { id } => {
            let id = resolve_timer(app, &id)?;
            let timer = app.timers.reset(&id).await.ok_or_else(|| not_found(&id))?;
            print_status(&timer);
            Ok(())
        }
        TimerCommands::Archive { id } => {
            let id = resolve_timer(app, &id)?;
            let timer = app.timers.archive(&id).await.ok_or_else(|| not_found(&id))?;
            print_status(&timer);
            Ok(())
        }
        TimerCommands::Delete { id } => {
            let id = resolve_timer(app, &id)?;
            if !app.timers.delete(&id).await {
                return Err(not_found(&id));
            }
            println!("{id}");
            Ok(())
        }
        TimerCommands::Run { id, .. } => run_timer_follow(app, &id).await,
        TimerCommands::Presets => {
            for preset in TimerPreset::ALL {
                println!(
                    "{:<14}  {:<14}  {}",
                    preset.to_string(),
                    preset.name(),
                    preset.description()
                );
            }
            Ok(())
        }
    }
}

fn run_timer_list(app: &App, all: bool, as_json: bool) -> Result<(), CliError> {
    let timers = if all {
        app.timers.list()
    } else {
        app.timers.active_timers()
    };

    if as_json {
        let json_items = timers
            .iter()
            .map(timer_to_list_item)
            .collect::<Vec<TimerListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if timers.is_empty() {
        println!("No timers yet. Try `cadence timer add --preset pomodoro`.");
    } else {
        for line in format_timer_lines(&timers) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Start the timer and redraw its progress until it stops running, keeping
/// the remote collections live meanwhile. Ctrl-C pauses it.
async fn run_timer_follow(app: &App, query: &str) -> Result<(), CliError> {
    if app.has_remote() && app.auth.user_id().is_some() {
        // Uploads re-key timers, so settle ids before resolving the query
        app.timers.sync().await;
    }
    let id = resolve_timer(app, query)?;
    let timer = app.timers.start(&id).await.ok_or_else(|| not_found(&id))?;
    if timer.status != TimerStatus::Running {
        print_status(&timer);
        return Ok(());
    }

    if app.start_live_sync() {
        tracing::debug!("Following remote changes while timer {} runs", id);
    }
    let result = follow_timer(app, &id).await;
    app.stop_live_sync();
    result
}

async fn follow_timer(app: &App, id: &EntityId) -> Result<(), CliError> {
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result?;
                println!();
                if let Some(timer) = app.timers.pause(id).await {
                    print_status(&timer);
                }
                return Ok(());
            }
            _ = refresh.tick() => {
                let Some(timer) = app.timers.get(id) else {
                    println!();
                    return Err(not_found(id));
                };
                print!("\r{}   ", format_progress_line(&timer));
                io::stdout().flush()?;
                if timer.status != TimerStatus::Running {
                    println!();
                    print_status(&timer);
                    return Ok(());
                }
            }
        }
    }
}

/// Creation draft from `timer add` flags. A preset supplies defaults that
/// the other flags override.
pub fn build_draft(
    name: Option<String>,
    description: Option<String>,
    segments: &[String],
    repeat: Option<u32>,
    preset: Option<&str>,
) -> Result<TimerDraft, CliError> {
    let segments = parse_segments(segments)?;

    let mut draft = match preset {
        Some(preset) => preset.parse::<TimerPreset>()?.draft(),
        None => {
            let name = name.clone().ok_or(CliError::IncompleteTimer)?;
            if segments.is_empty() {
                return Err(CliError::IncompleteTimer);
            }
            TimerDraft::new(name, Vec::new(), 1)
        }
    };

    if let Some(name) = name {
        draft.name = name;
    }
    if description.is_some() {
        draft.description = description;
    }
    if !segments.is_empty() {
        draft.segments = segments;
    }
    if let Some(repeat) = repeat {
        draft.repeat_count = repeat;
    }
    Ok(draft)
}

pub fn resolve_timer(app: &App, query: &str) -> Result<EntityId, CliError> {
    let timers = app.timers.list();
    resolve_id(query, "Timer", timers.iter().map(|timer| &timer.id))
}

fn not_found(id: &EntityId) -> CliError {
    CliError::NotFound {
        kind: "Timer",
        query: id.to_string(),
    }
}

fn print_status(timer: &Timer) {
    println!("{}  {}  {}", timer.id, timer.status, timer.name);
}
