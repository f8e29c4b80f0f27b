use std::process::ExitCode;
use steamos_diy::cli;

fn main() -> ExitCode {
    cli::run(cli::parse_args(std::env::args_os()))
}
