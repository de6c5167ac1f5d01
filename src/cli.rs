use std::error::Error;
use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wordstats_rs::fetch::DEFAULT_WIKI_URL;
use wordstats_rs::web::{self, WebConfig};

#[derive(Parser, Debug)]
#[command(
    name = "wordstats-rs",
    about = "Serve word-count statistics and charts for Wikipedia articles",
    version
)]
pub struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to bind the HTTP listener to.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Wikipedia site that articles are fetched from.
    #[arg(long, default_value = DEFAULT_WIKI_URL)]
    wiki_url: String,
}

impl Cli {
    fn into_config(self) -> WebConfig {
        WebConfig {
            addr: SocketAddr::new(self.host, self.port),
            wiki_url: self.wiki_url,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(web::serve(cli.into_config()))?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
