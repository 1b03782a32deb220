//! Binary entrypoint for wheelsmith

fn main() {
    if let Err(err) = wheelsmith_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(wheelsmith_cli::exit_code(&err));
    }
}
