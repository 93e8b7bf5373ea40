use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use sinkhole::resolver::DNS_PORT;
use sinkhole::server::{self, ServerConfig};
use sinkhole::transport::udp::DEFAULT_HOP_TIMEOUT;

#[derive(Parser)]
#[command(name = "sinkhole")]
#[command(about = "Iterative DNS resolver with a domain sinkhole", long_about = None)]
struct Args {
    /// File with one blocked domain per line
    blocklist: Option<PathBuf>,

    /// Local port to listen on
    #[arg(short, long, default_value = "5300")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to query root and authority servers on
    #[arg(long, default_value_t = DNS_PORT)]
    upstream_port: u16,

    /// Give up on an upstream server after this many milliseconds (0 waits forever)
    #[arg(long, default_value_t = DEFAULT_HOP_TIMEOUT.as_millis() as u64)]
    hop_timeout_ms: u64,

    /// Seconds between stats reports
    #[arg(long, default_value = "60")]
    stats_interval: u64,

    /// Log every query
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = ServerConfig {
        bind_addr: SocketAddr::new(args.bind, args.port),
        blocklist: args.blocklist,
        upstream_port: args.upstream_port,
        hop_timeout: (args.hop_timeout_ms > 0).then(|| Duration::from_millis(args.hop_timeout_ms)),
        stats_interval: Duration::from_secs(args.stats_interval.max(1)),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let local = tokio::task::LocalSet::new();
    if let Err(e) = local.block_on(&rt, server::run(config)) {
        error!(error = %e, "sinkhole failed to start");
        return Err(e.into());
    }

    Ok(())
}
