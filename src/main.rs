// POC Node - Entry point
// Principle: l'état du staking n'avance que par des blocs explicites

#![allow(dead_code)]

mod bank;
mod cli;
mod context;
mod genesis;
mod staking;
mod storage;
mod types;

#[cfg(test)]
mod tests;

use clap::Parser;
use cli::config::{query_request, NodeConfig};
use cli::{runner, Cli, Commands, KeySubcommand};
use genesis::GenesisDoc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::ConsPubKey;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_filter = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    match cli.command {
        Commands::Init(cmd) => {
            let config = NodeConfig::from_data_args(&cmd.data);
            let updates = runner::init(&config, &cmd.genesis).map_err(|e| {
                error!("Init failed: {}", e);
                anyhow::anyhow!("Init failed: {}", e)
            })?;

            info!("Data directory ready at {}", config.base_path.display());
            println!("{}", serde_json::to_string_pretty(&updates)?);
        }

        Commands::Replay(cmd) => {
            let config = NodeConfig::from_data_args(&cmd.data).with_invariants(!cmd.skip_invariants);
            let reports = runner::replay(&config, &cmd.blocks).map_err(|e| {
                error!("Replay failed: {}", e);
                anyhow::anyhow!("Replay failed: {}", e)
            })?;

            for report in &reports {
                println!("{}", serde_json::to_string(report)?);
            }
            info!("{} blocks applied", reports.len());
        }

        Commands::Export(cmd) => {
            let config = NodeConfig::from_data_args(&cmd.data);
            let doc = runner::export(&config, &cmd.output)?;
            info!(
                "Exported {} validators and {} delegations",
                doc.staking.validators.len(),
                doc.staking.delegations.len()
            );
        }

        Commands::ValidateGenesis(cmd) => {
            let doc = GenesisDoc::from_file(&cmd.file)?;
            doc.validate()?;
            println!("Genesis is valid");
            println!("Chain ID: {}", doc.chain_id);
            println!("Accounts: {}", doc.accounts.len());
            println!("Validators: {}", doc.staking.validators.len());
            println!("Digest: {}", doc.state_digest()?);
        }

        Commands::Query(cmd) => {
            let config = NodeConfig::from_data_args(&cmd.data);
            let request = query_request(&cmd.subcommand)?;
            let response = runner::query(&config, &request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Key(cmd) => match cmd.subcommand {
            KeySubcommand::Generate { output, format } => {
                generate_key(output.as_ref(), &format)?;
            }
            KeySubcommand::Inspect { key, public } => {
                inspect_key(&key, public)?;
            }
        },

        Commands::Purge(cmd) => {
            let path = cmd.data.get_base_path();

            if !cmd.yes {
                println!("This will delete all chain data at: {}", path.display());
                println!("Are you sure? [y/N]");

                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            if path.exists() {
                std::fs::remove_dir_all(&path)?;
                info!("Purged chain data at: {}", path.display());
            } else {
                info!("No data to purge at: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Generate a new ed25519 consensus keypair
fn generate_key(output: Option<&std::path::PathBuf>, format: &str) -> anyhow::Result<()> {
    use ed25519_dalek::{SigningKey, VerifyingKey};
    use rand::rngs::OsRng;

    info!("Generating ed25519 consensus keypair");

    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key: VerifyingKey = (&signing_key).into();
    let pubkey = ConsPubKey::from(&verifying_key);

    let secret_hex = format!("0x{}", hex::encode(signing_key.to_bytes()));

    match format {
        "json" => {
            let json = serde_json::json!({
                "scheme": "ed25519",
                "secretKey": secret_hex,
                "publicKey": pubkey,
                "consAddress": pubkey.address(),
            });

            let output_str = serde_json::to_string_pretty(&json)?;

            if let Some(path) = output {
                std::fs::write(path, &output_str)?;
                info!("Key saved to: {}", path.display());
            } else {
                println!("{}", output_str);
            }
        }
        "hex" => {
            println!("Secret Key: {}", secret_hex);
            println!("Public Key: {}", pubkey);
            println!("Cons Address: {}", pubkey.address());
        }
        _ => {
            return Err(anyhow::anyhow!("Unknown format: {}", format));
        }
    }

    Ok(())
}

/// Inspect a secret or public consensus key
fn inspect_key(key: &str, public: bool) -> anyhow::Result<()> {
    use ed25519_dalek::SigningKey;

    let key_hex = key.strip_prefix("0x").unwrap_or(key);
    let key_bytes: [u8; 32] = hex::decode(key_hex)?
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("Invalid key length: {} bytes (expected 32)", b.len()))?;

    let pubkey = if public {
        println!("Type: Public Key");
        ConsPubKey::from_bytes(key_bytes)
    } else {
        println!("Type: Secret Key");
        ConsPubKey::from(&SigningKey::from_bytes(&key_bytes).verifying_key())
    };

    if !pubkey.is_valid() {
        return Err(anyhow::anyhow!("Not a valid ed25519 public key: {}", pubkey));
    }

    println!("Public Key: {}", pubkey);
    println!("Cons Address: {}", pubkey.address());
    Ok(())
}
