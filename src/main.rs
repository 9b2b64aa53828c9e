mod cli;

use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` overrides the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("form_schema=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
