use std::process::ExitCode;

fn main() -> ExitCode {
    live_label::run_cli()
}
