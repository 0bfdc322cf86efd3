use std::process::ExitCode;

fn main() -> ExitCode {
    docusphere_cli::run()
}
