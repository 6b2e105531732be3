use std::io::{stdout, BufWriter, Write};

use clap::{Parser, ValueEnum};
use ebs_inventory::{
    ec2,
    errors::{Error, Result},
    inventory, sts,
};

/// Reports every attached EBS volume with its owning instance's "Name" tag.
#[derive(Parser, Debug)]
#[command(name = "ebs-inventory", version, about)]
struct Flags {
    /// Target region for the volume listing.
    #[arg(long, default_value = ebs_inventory::DEFAULT_REGION)]
    region: String,

    /// Named credential profile; the default AWS chain applies when unset.
    #[arg(long)]
    profile: Option<String>,

    /// Report rendition written to stdout.
    #[arg(long, value_enum, default_value = "text")]
    format: Format,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Format {
    Text,
    Json,
    Csv,
}

#[tokio::main]
async fn main() {
    // ref. https://github.com/env-logger-rs/env_logger/issues/47
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let flags = Flags::parse();
    if let Err(e) = run(flags).await {
        log::error!("failed to build the volume inventory ({})", e);
        std::process::exit(1);
    }
}

async fn run(flags: Flags) -> Result<()> {
    let shared_config = ebs_inventory::load_config(Some(flags.region), flags.profile).await;

    let sts_manager = sts::Manager::new(&shared_config);
    let identity = sts_manager.get_identity().await?;
    log::info!(
        "connected to account '{}' as '{}'",
        identity.account_id,
        identity.role_arn
    );

    let ec2_manager = ec2::Manager::new(&shared_config);
    let reports = inventory::collect(&ec2_manager).await?;

    let out = stdout();
    let mut out = BufWriter::new(out.lock());
    match flags.format {
        Format::Text => inventory::write_text(&mut out, &reports)?,
        Format::Json => inventory::write_json(&mut out, &reports)?,
        Format::Csv => inventory::write_csv(&mut out, &reports)?,
    }
    out.flush().map_err(|e| Error::Other {
        message: format!("failed to flush stdout {:?}", e),
        retryable: false,
    })?;

    Ok(())
}
