//! rawkv CLI Client
//!
//! Command-line interface for interacting with a rawkv server.

use clap::{Parser, Subcommand};
use rawkv::network::Client;
use rawkv::storage::CF_DEFAULT;

/// rawkv CLI
#[derive(Parser, Debug)]
#[command(name = "rawkv-cli")]
#[command(about = "CLI for the rawkv key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:20160")]
    server: String,

    /// Column family
    #[arg(long, default_value = CF_DEFAULT, global = true)]
    cf: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// List pairs starting at a key
    Scan {
        /// First key to return
        #[arg(default_value = "")]
        start: String,

        /// Maximum number of pairs
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(message) = run(&mut client, &args.cf, args.command) {
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

fn run(client: &mut Client, cf: &str, command: Commands) -> Result<(), String> {
    match command {
        Commands::Get { key } => {
            let resp = client.raw_get(cf, key.as_bytes()).map_err(|e| e.to_string())?;
            check(&resp.error)?;
            if resp.not_found {
                println!("(not found)");
            } else {
                println!("{}", String::from_utf8_lossy(&resp.value));
            }
        }
        Commands::Put { key, value } => {
            let resp = client
                .raw_put(cf, key.as_bytes(), value.as_bytes())
                .map_err(|e| e.to_string())?;
            check(&resp.error)?;
            println!("OK");
        }
        Commands::Delete { key } => {
            let resp = client.raw_delete(cf, key.as_bytes()).map_err(|e| e.to_string())?;
            check(&resp.error)?;
            println!("OK");
        }
        Commands::Scan { start, limit } => {
            let resp = client
                .raw_scan(cf, start.as_bytes(), limit)
                .map_err(|e| e.to_string())?;
            check(&resp.error)?;
            for pair in resp.kvs {
                println!(
                    "{} => {}",
                    String::from_utf8_lossy(&pair.key),
                    String::from_utf8_lossy(&pair.value)
                );
            }
        }
        Commands::Ping => {
            client.ping().map_err(|e| e.to_string())?;
            println!("PONG");
        }
    }
    Ok(())
}

/// Turn a response-level error into a failure
fn check(error: &str) -> Result<(), String> {
    if error.is_empty() {
        Ok(())
    } else {
        Err(error.to_string())
    }
}
