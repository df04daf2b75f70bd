use std::io;
use std::process::ExitCode;

use clap::Parser;
use krb_negotiate::cli::{self, Cli};

fn main() -> ExitCode {
    env_logger::init();

    let args = Cli::parse();
    match cli::run(&args, &mut io::stdout().lock()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("krb-mapping: {err}");
            ExitCode::FAILURE
        }
    }
}
