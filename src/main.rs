use std::env;
use std::process::exit;

mod cli;

use cli::{execute_command, parse_args};

fn main() {
    // Parse command line arguments
    let code = match parse_args(env::args()) {
        Ok(cli) => execute_command(&cli),
        Err(code) => code,
    };

    exit(code)
}
