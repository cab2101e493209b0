use clap::Parser;
use oracletrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
