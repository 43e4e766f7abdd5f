mod api;
mod lock;
mod users;

use crate::api::handle_serve_command;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use reqdesk_api::{AppConfig, hash_password};
use std::path::PathBuf;
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(
    name = "reqdesk",
    about = "Session timeout and screen lock service for the reqdesk requirements dashboard",
    long_about = "reqdesk keeps track of user activity in the requirements dashboard and either \
                  locks the screen or signs the user out after a period of inactivity.\n\n\
                  A countdown warning is published before the timeout fires, and a locked \
                  screen survives restarts until the user unlocks it with their password.\n\n\
                  Quick start:\n\
                  1. reqdesk add-user alice     # Create an account\n\
                  2. reqdesk serve              # Start the HTTP API\n\
                  3. reqdesk lock-status        # Inspect the persisted lock"
)]
pub struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        #[arg(short, long, help = "Address to bind the server to (overrides the config file)")]
        bind: Option<String>,
        #[arg(short, long, help = "Port to bind the server to")]
        port: Option<u16>,
    },

    /// Hash a password with Argon2 and print the PHC string
    HashPassword,

    /// Add an account, or replace the password of an existing one
    AddUser {
        /// Name the user signs in with
        username: String,
    },

    /// Show whether the screen lock is persisted
    LockStatus,

    /// Remove a persisted screen lock
    ClearLock,
}

impl Cli {
    /// # Errors
    ///
    /// Returns an error if no config directory can be determined for the current user.
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => AppConfig::default_path(),
        }
    }
}

/// Runs a single command against the config file at `config_path`.
///
/// # Errors
///
/// This function returns an error if:
/// - The config file cannot be read or carries invalid settings
/// - The server fails to bind or serve
/// - Password hashing or the lock state file fails
pub async fn handle_command(cmd: Commands, config_path: PathBuf) -> Result<()> {
    match cmd {
        Commands::Serve { bind, port } => {
            let config = AppConfig::load(&config_path)?;
            handle_serve_command(&config, bind, port).await?;
        }

        Commands::HashPassword => {
            let password = prompt_secret("Password: ")?;
            let confirm = prompt_secret("Confirm password: ")?;
            if password != confirm {
                return Err(eyre!("Passwords do not match"));
            }
            println!("{}", hash_password(&password)?);
        }

        Commands::AddUser { username } => {
            let password = prompt_secret(&format!("Password for '{username}': "))?;
            let confirm = prompt_secret("Confirm password: ")?;
            if password != confirm {
                return Err(eyre!("Passwords do not match"));
            }

            if users::add_user(&config_path, &username, &password)? {
                println!("✅ Password updated for '{username}'");
            } else {
                println!("✅ User '{username}' added");
            }
            println!("Config: {}", config_path.display());
        }

        Commands::LockStatus => {
            let config = AppConfig::load(&config_path)?;
            let state = lock::read_lock_state(&config)?;
            println!("{}", lock::describe(&state));
            println!("Lock state file: {}", config.lock_store()?.path().display());
        }

        Commands::ClearLock => {
            let config = AppConfig::load(&config_path)?;
            lock::clear_lock_state(&config)?;
            println!("🔓 Persisted lock cleared");
        }
    }

    Ok(())
}

fn prompt_secret(prompt: &str) -> Result<Zeroizing<String>> {
    use std::io::{Write, stdout};
    print!("{prompt}");
    stdout().flush()?;
    // Read without echo on Windows/Linux/macOS
    let pass = rpassword::prompt_password("")?;
    Ok(Zeroizing::new(pass))
}
