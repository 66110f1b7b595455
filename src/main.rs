mod args;
mod console;
mod debugger;
mod logging;

use clap::Parser;

use args::Args;

fn main() {
    let args = Args::parse();
    if let Err(e) = debugger::run_debugger(args) {
        eprintln!("nbdebug: {:#}", e);
        std::process::exit(1);
    }
}
