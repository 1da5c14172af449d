use std::path::PathBuf;

use cadence_core::auth::AuthUser;

use crate::app::App;
use crate::cli::AuthCommands;
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_auth(
    command: AuthCommands,
    config: &CliConfig,
    app: &App,
) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { user, email } => {
            let user_id = user.trim();
            if user_id.is_empty() {
                return Err(CliError::EmptyId("User"));
            }
            let mut next = AuthUser::new(user_id);
            if let Some(email) = cadence_core::util::normalize_text_option(email) {
                next = next.with_email(email);
            }

            if config.user_id().is_some_and(|current| current != next.id) {
                app.clear_local();
                println!("Cleared local data of the previous user");
            }

            let path = save_user(Some(next.clone()))?;
            app.auth.sign_in(next.clone());
            println!("Signed in as {next} ({})", path.display());

            if app.has_remote() {
                match (app.timers.sync().await, app.notes.sync().await) {
                    (Some(_), Some(_)) => println!("Initial sync completed"),
                    _ => println!("Initial sync failed; run `cadence sync` to retry"),
                }
            }
            Ok(())
        }
        AuthCommands::Status => {
            match &config.user {
                Some(user) => println!("Signed in as {user}"),
                None => println!("Not signed in."),
            }
            match &config.core.remote_base_url {
                Some(url) => println!("Remote: {url}"),
                None => println!("Remote: not configured (local only)"),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let timers = app.timers.count();
            let notes = app.notes.count();
            app.clear_local();
            app.auth.sign_out();

            save_user(None)?;
            println!("Signed out; cleared {timers} timers and {notes} notes");
            Ok(())
        }
    }
}

/// Persist the user without baking environment overrides into the file
fn save_user(user: Option<AuthUser>) -> Result<PathBuf, CliError> {
    let mut stored = CliConfig::load()?;
    stored.user = user;
    stored.save()
}
