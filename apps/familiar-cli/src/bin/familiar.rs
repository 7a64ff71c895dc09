use clap::Parser;
use std::process::ExitCode;

use familiar_cli::args::QueryArgs;
use familiar_cli::{commands, exit, logging};
use familiar_core::config::Config;

fn run(args: &QueryArgs) -> anyhow::Result<()> {
    let mut settings = Config::load()?.settings()?;
    args.apply(&mut settings);
    let prompt = commands::resolve_prompt(args)?;
    let output = commands::run_query(&prompt, args.format, &settings)?;
    println!("{output}");
    Ok(())
}

fn main() -> ExitCode {
    let args = QueryArgs::parse();
    logging::init(&args.log);
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if args.log.verbose || args.log.debug {
                eprintln!("Error: {e:?}");
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(exit::code_for_any(&e))
        }
    }
}
