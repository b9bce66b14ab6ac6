use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use lc_chain::{verify_records, Chain, ChainConfig, LedgerError, LedgerState};
use lc_client::paths::{ledger_snapshot_path, resolve_data_dir, settings_path};
use lc_client::{open_store, ClientError, ClientSettings, Messenger, Wallet};
use lc_crypto::AccountKey;
use lc_proto::Call;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledgerchat")]
#[command(about = "End-to-end encrypted messaging over a shared public ledger", long_about = None)]
struct Cli {
    /// Data directory (default: $LEDGERCHAT_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the two-party scenario on a fresh in-process ledger
    Demo {
        /// Save the resulting ledger to the data directory
        #[arg(long)]
        save: bool,
    },

    /// Show or change client settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Summarise a saved ledger snapshot and verify every conversation digest
    Inspect {
        /// Snapshot file (default: ledger.json in the data directory)
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the effective settings
    Show,

    /// Set one field
    Set {
        /// poll_interval_secs | default_fund_amount | store_file | auto_lock_secs
        key: String,
        value: String,
    },

    /// Print the settings file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Demo { save } => run_demo(&data_dir, save).await,
        Commands::Settings { action } => run_settings(&data_dir, action),
        Commands::Inspect { snapshot } => {
            let path = snapshot.unwrap_or_else(|| ledger_snapshot_path(&data_dir));
            run_inspect(&path)
        }
    }
}

async fn run_demo(data_dir: &Path, save: bool) -> Result<()> {
    let settings = ClientSettings::load(&settings_path(data_dir))?;
    let alice_key = AccountKey::generate();
    let bob_key = AccountKey::generate();
    let (a, b) = (alice_key.address(), bob_key.address());

    let chain = Chain::start(
        ChainConfig::default()
            .with_allocation(a, 1_000)
            .with_allocation(b, 1_000),
    );

    // Each party gets a private keystore; nothing secret is shared.
    let scratch = tempfile::tempdir()?;
    let alice = client(&chain, alice_key, &scratch.path().join("alice"), &settings).await?;
    let bob = client(&chain, bob_key, &scratch.path().join("bob"), &settings).await?;

    alice.ensure_profile("Alice", "").await?;
    bob.ensure_profile("Bob", "").await?;
    println!("alice  {a}");
    println!("bob    {b}");

    let ka = alice.keys().ensure_session_key().await?;
    let kb = bob.keys().ensure_session_key().await?;
    println!("session keys published: alice {}  bob {}", ka.fingerprint(), kb.fingerprint());

    let conversation = alice.open_conversation(&b).await?;
    println!("conversation {conversation}");

    let index = alice.send(&b, "hello").await?;
    println!("alice -> bob  #{index}");

    for m in bob.read(&a, 0, 10).await? {
        println!("bob reads #{} from {}: {}", m.index, m.sender_owner.short(), body(&m.body));
    }

    match bob.wallet().send(Call::CreateConversation { other: a }).await {
        Err(ClientError::Ledger(LedgerError::Conflict(reason))) => {
            println!("bob's duplicate create rejected: {reason}")
        }
        other => bail!("expected a conflict, got {other:?}"),
    }

    let delegate = alice.delegate().prepare().await?;
    alice.delegate().authorize().await?;
    alice.delegate().fund(settings.default_fund_amount).await?;
    println!("alice authorized delegate {delegate}");

    alice.send(&b, "sent with the delegate key").await?;
    for m in bob.latest(&a, 1).await? {
        println!(
            "bob reads #{} from {} (signed by {}): {}",
            m.index,
            m.sender_owner.short(),
            m.sender_address.short(),
            body(&m.body)
        );
    }

    bob.send(&a, "hi alice").await?;
    for m in alice.latest(&b, 1).await? {
        println!("alice reads #{}: {}", m.index, body(&m.body));
    }

    if save {
        let path = ledger_snapshot_path(data_dir);
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&path, serde_json::to_vec_pretty(&chain.snapshot())?)?;
        info!(path = %path.display(), "ledger snapshot saved");
        println!("ledger saved to {}", path.display());
    }
    Ok(())
}

async fn client(chain: &Chain, key: AccountKey, dir: &Path, settings: &ClientSettings) -> Result<Messenger> {
    let store = open_store(dir, settings, b"demo passphrase").await?;
    Ok(Messenger::new(Wallet::new(key, chain.clone()), store, settings))
}

fn body(body: &Result<String, ClientError>) -> String {
    match body {
        Ok(text) => text.clone(),
        Err(e) => format!("<{e}>"),
    }
}

fn run_settings(data_dir: &Path, action: SettingsAction) -> Result<()> {
    let path = settings_path(data_dir);
    match action {
        SettingsAction::Show => {
            let settings = ClientSettings::load(&path)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Path => println!("{}", path.display()),
        SettingsAction::Set { key, value } => {
            let mut settings = ClientSettings::load(&path)?;
            let parse = |v: &str| -> Result<u64> {
                v.parse().with_context(|| format!("{key} expects a non-negative integer"))
            };
            match key.as_str() {
                "poll_interval_secs" => settings.poll_interval_secs = parse(&value)?,
                "default_fund_amount" => settings.default_fund_amount = parse(&value)?,
                "auto_lock_secs" => settings.auto_lock_secs = parse(&value)?,
                "store_file" => {
                    if value.is_empty() || value.contains(['/', '\\']) {
                        bail!("store_file must be a plain file name");
                    }
                    settings.store_file = value;
                }
                other => bail!("unknown setting '{other}'"),
            }
            settings.save(&path)?;
            info!(path = %path.display(), "settings saved");
        }
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let state: LedgerState = serde_json::from_slice(&raw).context("parsing ledger snapshot")?;

    println!("height        {}", state.height());
    println!("tx fee        {}", state.config().tx_fee);
    println!("profiles      {}", state.registry().profile_count());
    println!("conversations {}", state.directory().len());

    let mut failures = 0;
    for conv in state.directory().iter() {
        let info = conv.info();
        let records = conv.get_messages(0, info.message_count);
        let delegated = records.iter().filter(|m| m.via_delegate()).count();
        let verdict = match verify_records(&info, &records) {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                failures += 1;
                format!("FAILED: {e}")
            }
        };
        println!(
            "  {}  {} <-> {}  {} messages ({} via delegate)  digest {}",
            info.id,
            info.participants[0].short(),
            info.participants[1].short(),
            info.message_count,
            delegated,
            verdict
        );
    }

    if failures > 0 {
        return Err(anyhow!("{failures} conversation(s) failed digest verification"));
    }
    Ok(())
}
