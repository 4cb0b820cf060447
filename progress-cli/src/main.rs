//! # Pleasant Progress
//!
//! Host simulator and operator tool for the progress tone replacement.

use log::error;

mod cli;
mod controls;
mod host;
mod logging;
mod runner;
mod ui;

fn main() {
    dotenv::dotenv().ok();
    let log_buffer = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_buffer) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            eprintln!("pleasant-progress: {}", err.to_string().to_lowercase());
            1
        }
    };

    std::process::exit(code)
}
