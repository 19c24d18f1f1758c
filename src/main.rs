use restpulse::core;
use restpulse::status::ExitStatus;

/// Entry point; exit status comes straight from `core::run`
fn main() -> ExitStatus {
    let args: Vec<String> = std::env::args().collect();
    core::run(args)
}
