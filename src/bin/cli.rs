//! Key Server CLI
//!
//! Command-line interface for reading and writing key server halves,
//! against a running server or directly against a local log file.
//! Identifiers and values are hex-encoded.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use keyserver::{
    BlockCryptKeyServerHalf, BlockId, Config, CryptPublicKey, DirId, KeyGen, KeyOps, KeyServer,
    KeyServerError, MacPublicKey, TlfCryptKeyServerHalf, UserId,
};
use tracing_subscriber::{fmt, EnvFilter};

/// Key server CLI
#[derive(Parser, Debug)]
#[command(name = "keyserver-cli")]
#[command(about = "CLI for the key server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7461", conflicts_with = "db")]
    server: String,

    /// Operate on a local log file instead of a server
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a block's server half
    GetBlock { id: String },

    /// Store a block's server half
    PutBlock { id: String, half: String },

    /// Delete a block's server half
    DelBlock { id: String },

    /// Get a folder server half
    GetTlf {
        dir: String,
        key_gen: u32,
        device_key: String,
    },

    /// Store a folder server half
    PutTlf {
        dir: String,
        key_gen: u32,
        device_key: String,
        half: String,
    },

    /// Delete a folder server half
    DelTlf {
        dir: String,
        key_gen: u32,
        device_key: String,
    },

    /// Get a user's MAC public key
    GetMac { user: String },

    /// Store a user's MAC public key
    PutMac { user: String, key: String },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    let config = match &args.db {
        Some(path) => Config::builder().db_file(path).build(),
        None => Config::builder().remote(&args.server).build(),
    };

    let server = match KeyServer::open(&config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&server, args.command) {
        Ok(Some(output)) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("OK");
            ExitCode::SUCCESS
        }
        Err(KeyServerError::NotFound) => {
            eprintln!("(not found)");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(server: &KeyServer, command: Commands) -> keyserver::Result<Option<String>> {
    match command {
        Commands::GetBlock { id } => {
            let half = server.get_block_crypt_key_server_half(&BlockId::from_hex(&id)?)?;
            Ok(Some(half.to_hex()))
        }
        Commands::PutBlock { id, half } => {
            server.put_block_crypt_key_server_half(
                &BlockId::from_hex(&id)?,
                &BlockCryptKeyServerHalf::from_hex(&half)?,
            )?;
            Ok(None)
        }
        Commands::DelBlock { id } => {
            server.delete_block_crypt_key_server_half(&BlockId::from_hex(&id)?)?;
            Ok(None)
        }
        Commands::GetTlf {
            dir,
            key_gen,
            device_key,
        } => {
            let half = server.get_tlf_crypt_key_server_half(
                &DirId::from_hex(&dir)?,
                KeyGen(key_gen),
                &CryptPublicKey::from_hex(&device_key)?,
            )?;
            Ok(Some(half.to_hex()))
        }
        Commands::PutTlf {
            dir,
            key_gen,
            device_key,
            half,
        } => {
            server.put_tlf_crypt_key_server_half(
                &DirId::from_hex(&dir)?,
                KeyGen(key_gen),
                &CryptPublicKey::from_hex(&device_key)?,
                &TlfCryptKeyServerHalf::from_hex(&half)?,
            )?;
            Ok(None)
        }
        Commands::DelTlf {
            dir,
            key_gen,
            device_key,
        } => {
            server.delete_tlf_crypt_key_server_half(
                &DirId::from_hex(&dir)?,
                KeyGen(key_gen),
                &CryptPublicKey::from_hex(&device_key)?,
            )?;
            Ok(None)
        }
        Commands::GetMac { user } => {
            let key = server.get_mac_public_key(&UserId::from_hex(&user)?)?;
            Ok(Some(key.to_hex()))
        }
        Commands::PutMac { user, key } => {
            server.put_mac_public_key(&UserId::from_hex(&user)?, &MacPublicKey::from_hex(&key)?)?;
            Ok(None)
        }
        Commands::Ping => match server {
            KeyServer::Remote(remote) => {
                remote.ping()?;
                Ok(Some("PONG".to_string()))
            }
            KeyServer::Local(_) => Ok(Some("PONG (local)".to_string())),
        },
    }
}
