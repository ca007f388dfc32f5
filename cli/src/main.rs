mod commands;
mod terminal;

use commands::{CommandLine, Commands, scan};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    match commands.command {
        Commands::Scan(args) => {
            logging::init_logging(args.trace);
            print::header("starting scanner");
            scan::scan(args).await
        }
    }
}
