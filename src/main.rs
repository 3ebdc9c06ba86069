use std::env;

use quartermaster::{cli, logging};

fn main() {
    logging::init_tracing();
    let args: Vec<String> = env::args().collect();
    std::process::exit(cli::run_with_args(&args));
}
