use clap::Parser;
use log::{error, info};
use server::config::{GameModelConfig, ServerConfig};
use server::map::{default_arena, load_walls};
use server::network::GameServer;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Minimum distance between a spawn point and a visible player
    #[clap(long, default_value = "5.0")]
    min_spawn_distance: f32,
    #[clap(long, default_value = "25.0")]
    bullet_speed: f32,
    #[clap(long, default_value = "10")]
    magazine_size: u32,
    /// Number of bots, given ids -1 to -N
    #[clap(long, default_value = "5")]
    bots: u32,
    /// TOML file with the wall layout; a built-in arena is used otherwise
    #[clap(long)]
    map: Option<PathBuf>,
    /// Ticks a movement message keeps steering its player
    #[clap(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    move_ttl: u32,
    #[clap(long, default_value = "32")]
    max_clients: usize,
    /// Seed for bot decisions
    #[clap(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let walls = match &args.map {
        Some(path) => load_walls(path)?,
        None => default_arena(),
    };
    info!("Loaded {} walls", walls.len());

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        tick_duration: ServerConfig::tick_duration_for(args.tick_rate),
        move_action_ttl: args.move_ttl,
        max_clients: args.max_clients,
        bot_count: args.bots,
        seed: args.seed,
    };
    let model_config = GameModelConfig {
        min_spawn_distance: args.min_spawn_distance,
        bullet_speed: args.bullet_speed,
        magazine_size: args.magazine_size,
    };

    let mut server = GameServer::bind(config, walls, model_config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Simulation stopped: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
