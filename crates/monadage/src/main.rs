mod bindings;
mod catalog;
mod cli;
mod listing;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Effects(args)) => listing::list_effects(args),
        Some(Command::Info(args)) => listing::show_info(args),
        None => run::run(cli.run),
    }
}
