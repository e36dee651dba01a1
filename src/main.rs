//! Provides the main entry point to the program.
use ::log::error;
use human_panic::{metadata, setup_panic};
use iamsim::cli::run_cli;
use iamsim::log::is_logger_initialised;

fn main() {
    setup_panic!(metadata!().support("Please file an issue with the panic report attached."));

    if let Err(err) = run_cli() {
        if is_logger_initialised() {
            error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        // Terminate program, signalling an error
        std::process::exit(1);
    }
}
