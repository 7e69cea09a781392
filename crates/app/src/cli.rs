use std::net::SocketAddr;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Overrides AGORA_HTTP_ADDR.
    #[arg(long)]
    pub http_addr: Option<SocketAddr>,
    #[arg(long, default_value_t = false)]
    pub skip_migrations: bool,
}
