use std::process;

use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::EnvFilter;

use goscan::{app, cli};

fn init_tracing() {
    // Default WARN; RUST_LOG overrides.
    let env_filter = EnvFilter::from_default_env().add_directive(Level::WARN.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    let _ = set_global_default(subscriber);
}

fn main() {
    let options = cli::parse_args();
    init_tracing();
    if let Err(err) = app::run(&options) {
        eprintln!("{err}");
        process::exit(1);
    }
}
