// Declare the modules
pub mod api;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod parser;
pub mod render;
pub mod state;
pub mod storage;
pub mod wiki;

use anyhow::{Context, Result};
use commands::{execute, parse_command, write_welcome, Flow};
use config::AppConfig;
use state::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let app_state = AppState::from_config(config).context("Failed to initialise app state")?;

    let mut stdout = std::io::stdout();
    write_welcome(&app_state, &mut stdout)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let command = parse_command(&line);
        if execute(&app_state, command, &mut stdout).await? == Flow::Exit {
            break;
        }
    }
    log::info!("Session ended");
    Ok(())
}
