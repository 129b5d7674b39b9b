use clap::{Parser, Subcommand};
use log::{LevelFilter, info};
use mini_chord::utils::setup_logging;
use mini_chord::{ChordNode, Config, DhtClient, PieceDirectory, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mini-chord")]
#[command(about = "A Chord distributed hash table node")]
#[command(version)]
struct Cli {
    /// Log level; RUST_LOG overrides it per module
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node and run until Ctrl+C
    Start {
        /// Address to listen on (host:port)
        #[arg(short, long)]
        listen: Option<String>,
        /// Address other nodes should dial, if different
        #[arg(short, long)]
        advertise: Option<String>,
        /// Ring member to join through; a new ring is created without it
        #[arg(short, long)]
        join: Option<String>,
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Store a value in the ring
    Put {
        /// Any ring member
        #[arg(short, long)]
        peer: String,
        key: String,
        value: String,
    },
    /// Look a key up
    Get {
        /// Any ring member
        #[arg(short, long)]
        peer: String,
        key: String,
    },
    /// Announce that `holder` serves `piece`
    Announce {
        /// Any ring member
        #[arg(short, long)]
        peer: String,
        piece: String,
        holder: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level);

    match cli.command {
        Commands::Start {
            listen,
            advertise,
            join,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            if advertise.is_some() {
                config.advertise_addr = advertise;
            }
            if join.is_some() {
                config.bootstrap_peer = join;
            }

            let node = ChordNode::bind(config).await?;
            match node.config.bootstrap_peer.clone() {
                Some(peer) => node.join(&peer).await?,
                None => node.create().await,
            }
            node.start().await;
            info!("Node {} ({}) running, Ctrl+C to leave", node.addr(), node.id());

            tokio::signal::ctrl_c().await?;
            node.quit().await;
            node.metrics().print_stats().await;
        }
        Commands::Put { peer, key, value } => {
            let client = remote(peer);
            client.put(&key, &value).await?;
            println!("Stored {}", key);
        }
        Commands::Get { peer, key } => {
            let client = remote(peer);
            match client.get(&key).await? {
                Some(value) => println!("{}", value),
                None => println!("{} not found", key),
            }
        }
        Commands::Announce {
            peer,
            piece,
            holder,
        } => {
            let client = remote(peer);
            if client.announce_holder(&piece, &holder).await? {
                println!("Announced {} for {}", holder, piece);
            } else {
                println!("{} already listed for {}", holder, piece);
            }
            println!("Holders: {}", client.holders(&piece).await?.join(", "));
        }
    }

    Ok(())
}

fn remote(peer: String) -> DhtClient {
    let config = Config::default();
    DhtClient::new(peer, Duration::from_secs(2), config.max_hops)
}
