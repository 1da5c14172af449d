use cadence_core::models::{NoteDraft, NotePatch};
use cadence_core::EntityId;

use crate::app::App;
use crate::cli::NoteCommands;
use crate::commands::common::{
    format_note_lines, normalize_search_query, note_to_list_item, resolve_id,
    resolve_note_content, NoteListItem,
};
use crate::error::CliError;

pub async fn run_note(command: NoteCommands, app: &App) -> Result<(), CliError> {
    match command {
        NoteCommands::Add { title, content } => {
            let content = resolve_note_content(&content)?;
            let draft = NoteDraft::new(title.unwrap_or_default(), content);
            let note = app.notes.create(draft).await?;
            println!("{}", note.id);
            Ok(())
        }
        NoteCommands::List { limit, json } => {
            let notes = app.notes.recent(limit);
            print_notes(&notes, json, "No notes yet.")
        }
        NoteCommands::Search { query, json } => {
            let query = normalize_search_query(&query)?;
            let notes = app.notes.search(&query);
            print_notes(&notes, json, "No matching notes.")
        }
        NoteCommands::Edit { id, title, content } => {
            let id = resolve_note(app, &id)?;
            if title.is_none() && content.is_none() {
                return Err(CliError::NothingToChange);
            }
            let patch = NotePatch {
                title,
                content,
                completed: None,
            };
            let note = app
                .notes
                .update(&id, patch)
                .await?
                .ok_or_else(|| not_found(&id))?;
            println!("{}", note.id);
            Ok(())
        }
        NoteCommands::Toggle { id } => {
            let id = resolve_note(app, &id)?;
            let note = app
                .notes
                .toggle_completed(&id)
                .await
                .ok_or_else(|| not_found(&id))?;
            let state = if note.completed { "done" } else { "open" };
            println!("{}  {state}", note.id);
            Ok(())
        }
        NoteCommands::Delete { id } => {
            let id = resolve_note(app, &id)?;
            if !app.notes.delete(&id).await {
                return Err(not_found(&id));
            }
            println!("{id}");
            Ok(())
        }
    }
}

fn print_notes(
    notes: &[cadence_core::Note],
    as_json: bool,
    empty_message: &str,
) -> Result<(), CliError> {
    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("{empty_message}");
    } else {
        for line in format_note_lines(notes) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn resolve_note(app: &App, query: &str) -> Result<EntityId, CliError> {
    let notes = app.notes.list();
    resolve_id(query, "Note", notes.iter().map(|note| &note.id))
}

fn not_found(id: &EntityId) -> CliError {
    CliError::NotFound {
        kind: "Note",
        query: id.to_string(),
    }
}
