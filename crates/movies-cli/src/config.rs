use clap::{Parser, Subcommand};

use crate::commands::{issue_token::IssueTokenCmd, migrate::MigrateCmd};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "CLI for movies catalog - prepares database and issues API tokens for the server."
)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Creates database if needed and applies pending migrations
    Migrate(MigrateCmd),
    /// Issues signed API token for a user
    IssueToken(IssueTokenCmd),
}

impl crate::commands::Executor for Command {
    async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::Migrate(cmd) => cmd.run().await,
            Command::IssueToken(cmd) => cmd.run().await,
        }
    }
}
