// rmi4utils - Synaptics RMI4 over HID diagnostics

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let mut filter = EnvFilter::from_default_env().add_directive("rmi4utils=info".parse()?);
    if verbose {
        for directive in ["rmi4utils=debug", "rmi_transport=debug", "rmi_device=debug"] {
            filter = filter.add_directive(directive.parse()?);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut device = commands::open_device(&cli)?;
    let result = match cli.command {
        Commands::Info => commands::query::info(&mut device, cli.json),
        Commands::Reset => commands::query::reset(&mut device, cli.json),
        Commands::Read { addr, len } => commands::register::read(&mut device, addr, len, cli.json),
        Commands::Write { addr, ref data } => {
            commands::register::write(&mut device, addr, data, cli.json)
        }
        Commands::Attn {
            mask,
            function,
            count,
            timeout_ms,
        } => commands::attention::watch(&device, mask, function, count, timeout_ms, cli.json),
    };

    device.transport().close();
    result
}
