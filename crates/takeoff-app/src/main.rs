//! Command-line entry point.

fn main() {
    env_logger::init();
    log::info!("Starting takeoff");

    if let Err(error) = takeoff_app::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
