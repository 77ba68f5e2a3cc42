//! zkid-issuer
//!
//! Creates an issuer identity, issues and revokes claims, and writes the
//! proof inputs of each step as JSON.

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use halo2curves_axiom::bn256::Fr;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zkid_common::fr_to_decimal;
use zkid_identity::{
    Claim, ClaimOptions, FileKeyStore, Identifier, Issuer, SchemaHash, StateTransition, Subject,
};
use zkid_merkle::SledStorage;

use crate::config::IssuerConfig;

const STATE_TRANSITION_INPUTS_FILE: &str = "stateTransition_inputs.json";
const CLAIM_INPUTS_FILE: &str = "claim_inputs.json";

#[derive(Parser)]
#[command(name = "zkid-issuer", about = "Issuer identity and claim tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the genesis identity and its first state transition.
    Init,
    /// Issue a claim to a holder.
    Claim(ClaimArgs),
    /// Revoke a previously issued claim by its revocation nonce.
    Revoke(RevokeArgs),
    /// Print the identifier and current tree state.
    Status,
}

#[derive(Args)]
struct ClaimArgs {
    /// Base58 identifier of the holder.
    #[arg(long = "holderId")]
    holder_id: Identifier,
    #[arg(long, default_value_t = 2)]
    nonce: u64,
    #[arg(long, default_value_t = 25)]
    age: u64,
    /// JSON-LD document the claim schema hash is derived from.
    #[arg(long, default_value = "./schemas/test.json-ld")]
    schema: PathBuf,
    #[arg(long, default_value = "KYCAgeCredential")]
    type_name: String,
}

#[derive(Args)]
struct RevokeArgs {
    #[arg(long)]
    nonce: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    id: String,
    state: String,
    claims_tree_root: String,
    rev_tree_root: String,
    roots_tree_root: String,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zkid_issuer=info,zkid_identity=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = IssuerConfig::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init(&config),
        Commands::Claim(args) => claim(&config, args),
        Commands::Revoke(args) => revoke(&config, args),
        Commands::Status => status(&config),
    }
}

fn open_storage(config: &IssuerConfig) -> Result<SledStorage> {
    SledStorage::open(&config.db_path)
        .with_context(|| format!("failed to open tree store {}", config.db_path.display()))
}

fn load_issuer(config: &IssuerConfig) -> Result<Issuer<SledStorage>> {
    let keystore = FileKeyStore::new(&config.keys_dir);
    Issuer::load(open_storage(config)?, &keystore)
        .context("failed to load issuer identity; run `init` first")
}

fn init(config: &IssuerConfig) -> Result<()> {
    let keystore = FileKeyStore::new(&config.keys_dir);
    let (issuer, transition) =
        Issuer::init(open_storage(config)?, &keystore, &mut rand::rngs::OsRng)
            .context("failed to create issuer identity")?;

    info!("Issuer identity: {}", issuer.id());
    write_transition(config, &transition)?;
    println!("{}", issuer.id());
    Ok(())
}

fn claim(config: &IssuerConfig, args: ClaimArgs) -> Result<()> {
    let mut issuer = load_issuer(config)?;

    let document = fs::read(&args.schema)
        .with_context(|| format!("failed to read schema {}", args.schema.display()))?;
    let schema = SchemaHash::for_type(&document, &args.type_name);
    let options = ClaimOptions::new(args.nonce)
        .with_subject(Subject::OtherIndex(args.holder_id))
        .with_index_data([Fr::from(args.age)]);
    let claim = Claim::new(schema, &options).context("failed to encode claim")?;

    let prior = issuer.current_state()?;
    let issuance = issuer
        .issue_claim(&claim, &prior)
        .with_context(|| format!("failed to issue claim with nonce {}", args.nonce))?;

    info!(
        "Issued {} claim to {} (schema {})",
        args.type_name, args.holder_id, schema
    );
    write_transition(config, &issuance.transition)?;
    write_json(
        &config.output_dir,
        CLAIM_INPUTS_FILE,
        &issuance.disclosure.claim_inputs(),
    )
}

fn revoke(config: &IssuerConfig, args: RevokeArgs) -> Result<()> {
    let mut issuer = load_issuer(config)?;
    let transition = issuer
        .revoke(args.nonce)
        .with_context(|| format!("failed to revoke nonce {}", args.nonce))?;
    info!("Revoked nonce {}", args.nonce);
    write_transition(config, &transition)
}

fn status(config: &IssuerConfig) -> Result<()> {
    let issuer = load_issuer(config)?;
    let state = issuer.current_state()?;
    let report = StatusReport {
        id: issuer.id().to_string(),
        state: fr_to_decimal(&state.state()),
        claims_tree_root: fr_to_decimal(&state.claims_root()),
        rev_tree_root: fr_to_decimal(&state.revocation_root()),
        roots_tree_root: fr_to_decimal(&state.root_of_roots()),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize status")?;
    println!("{}", json);
    Ok(())
}

fn write_transition(config: &IssuerConfig, transition: &StateTransition) -> Result<()> {
    write_json(
        &config.output_dir,
        STATE_TRANSITION_INPUTS_FILE,
        &transition.inputs(),
    )
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    let json = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize {}", name))?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
