//! `vetro settings` command implementation.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use vetro_config::{CliSettings, Config};
use vetro_session::{FileBlobStore, KeyPreference, SessionPatch, SessionState, SharedState};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the settings command.
#[derive(Args)]
pub(crate) struct SettingsArgs {
    #[command(subcommand)]
    action: SettingsAction,

    /// Path to configuration file (default: auto-discover vetro.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session store directory (overrides config).
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show the saved key, preference and effective key source.
    Show,
    /// Save a user API key.
    SetKey {
        /// The API key.
        key: String,
    },
    /// Remove the saved user API key.
    ClearKey,
    /// Choose which key runs use: `user` or `backend`.
    Prefer {
        preference: KeyPreference,
    },
}

impl SettingsArgs {
    /// Execute the settings command.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or the session store
    /// cannot be written.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let cli_settings = CliSettings {
            store_dir: self.store_dir,
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let store_dir = &config.session_resolved.store_dir;
        let session = SharedState::new(FileBlobStore::new(store_dir));

        match self.action {
            SettingsAction::Show => {
                output.info(&format!("Session store: {}", store_dir.display()));
                print_state(&output, &session.load(), config.backend_api_key().as_deref());
            }
            SettingsAction::SetKey { key } => {
                if key.trim().is_empty() {
                    output.warning("Empty key given, clearing the saved key instead.");
                }
                let state = session.save(SessionPatch::new().api_key(key))?;
                if state.has_api_key() {
                    output.success("API key saved.");
                }
            }
            SettingsAction::ClearKey => {
                session.clear_api_key()?;
                output.success("API key cleared.");
            }
            SettingsAction::Prefer { preference } => {
                session.save(SessionPatch::new().key_preference(preference))?;
                output.success(&format!("Key preference: {preference}"));
            }
        }

        Ok(())
    }
}

fn print_state(output: &Output, state: &SessionState, backend_key: Option<&str>) {
    let user_key = state
        .api_key
        .as_deref()
        .map_or_else(|| "(not set)".to_owned(), mask_key);
    output.info(&format!("User API key: {user_key}"));
    output.info(&format!(
        "Backend API key: {}",
        if backend_key.is_some() { "configured" } else { "(not set)" }
    ));
    output.info(&format!("Key preference: {}", state.key_preference()));

    match state.effective_api_key(backend_key) {
        Some(key) if state.api_key.as_deref() == Some(key.as_str()) => {
            output.success("Runs will use the user key.");
        }
        Some(_) => output.success("Runs will use the backend key."),
        None => output.warning("No API key available. Use `vetro settings set-key <KEY>`."),
    }
}

/// Show only the last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    if chars.len() <= 4 {
        "****".to_owned()
    } else {
        format!("****{tail}")
    }
}
