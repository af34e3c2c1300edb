mod commands;
mod terminal;

use commands::{CommandLine, Commands, query, serve};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);

    match commands.command {
        Commands::Query(args) => {
            print::header("fanning out", commands.quiet);
            query::query(args, commands.quiet).await
        }
        Commands::Serve(args) => serve::serve(args).await,
    }
}
