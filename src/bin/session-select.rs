fn main() -> std::process::ExitCode {
    steamos_diy::cli::run_alias(&["select"])
}
