use crate::cli::{Cli, Command};

pub mod config;
pub mod context;
pub mod install;
pub mod list;

pub async fn dispatch(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::List(args) => list::run(args).await,
        Command::Install(args) => install::run(args).await,
        Command::Config(args) => config::run(args).await,
    }
}
