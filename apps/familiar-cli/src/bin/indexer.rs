use clap::Parser;
use std::process::ExitCode;

use familiar_cli::args::IndexArgs;
use familiar_cli::{commands, exit, logging};
use familiar_core::config::Config;

fn run(args: &IndexArgs) -> anyhow::Result<()> {
    let mut settings = Config::load()?.settings()?;
    args.apply(&mut settings);
    let (_, summary) = commands::run_index(args, &settings)?;
    println!("{summary}");
    Ok(())
}

fn main() -> ExitCode {
    let args = IndexArgs::parse();
    logging::init(&args.log);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit::code_for_any(&e))
        }
    }
}
