use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use lookups::engine::Engine;
use lookups::resolve::ResolutionError;

use crate::args::DnsArgs;
use crate::args::GlobalArgs;

/// Resolve hostnames and record their IPv4 addresses in the `lookups` table
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Hostnames to resolve, processed in order
    names: Vec<String>,

    #[clap(flatten)]
    dns_args: DnsArgs,

    #[clap(flatten)]
    global_args: GlobalArgs,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let _guard = cli.global_args.init_tracing()?;

    let db = cli.global_args.get_db().await?;
    let engine = Engine::builder()
        .resolver(cli.dns_args.resolver())
        .db(db)
        .build();

    engine
        .run(&cli.names, |name, error| {
            println!("{}", failure_line(name, error));
        })
        .await
        .context("unable to record lookups")?;

    Ok(())
}

/// The line an operator sees for a name that could not be resolved.
fn failure_line(name: &str, error: &ResolutionError) -> String {
    format!("name failed: {name}: {error}")
}
