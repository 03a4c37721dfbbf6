use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::SecretString;

use ethwallet::config::ConfigStore;
use ethwallet::errors::WalletResult;
use ethwallet::explorer::ExplorerClient;
use ethwallet::rpc::RpcGateway;
use ethwallet::storage::WalletPaths;
use ethwallet::transaction::TransactionManager;
use ethwallet::wallet::WalletManager;

#[derive(Parser)]
#[command(name = "ethwallet", about = "Ethereum transfer wallet", version)]
struct Cli {
    /// Wallet data directory; defaults to $ETHWALLET_DATA_DIR, then
    /// ~/.ethwallet
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wallet management
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// Transfers and status
    #[command(subcommand)]
    Tx(TxCommand),
    /// Network state
    #[command(subcommand)]
    Network(NetworkCommand),
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Generate a new wallet
    Generate,
    /// Import a raw private key (64 hex chars)
    Import { private_key: String },
    /// Show a wallet with its live balance
    Info {
        /// Defaults to the default wallet
        address: Option<String>,
        /// Also verify the password decrypts the stored key
        #[arg(long)]
        check_key: bool,
    },
    /// List stored wallets
    List,
    /// Mark a wallet as the default sender
    SetDefault { address: String },
}

#[derive(Subcommand)]
enum TxCommand {
    /// Build, sign, and broadcast a transfer
    Send {
        #[arg(long)]
        to: String,
        /// Amount in ether, e.g. 0.05
        #[arg(long)]
        amount: String,
        /// Sender address; defaults to the default wallet
        #[arg(long)]
        from: Option<String>,
    },
    /// Check the status of a broadcast transaction
    Status { tx_hash: String },
    /// Fetch recent transactions from the explorer
    History {
        /// Defaults to the default wallet
        address: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Also write the result to the export directory
        #[arg(long)]
        export: bool,
    },
}

#[derive(Subcommand)]
enum NetworkCommand {
    /// Chain id, latest block, and gas price
    Info,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> WalletResult<()> {
    let paths = WalletPaths::new(resolve_data_dir(cli.data_dir))?;
    let wallets = WalletManager::new(&paths)?;
    let config = ConfigStore::new(paths.config_file()).load_or_default()?;

    match cli.command {
        Command::Wallet(WalletCommand::Generate) => {
            let password = read_password("Password for the new wallet: ")?;
            let address = wallets.generate(&password)?;
            println!("{}", address);
        }
        Command::Wallet(WalletCommand::Import { private_key }) => {
            let password = read_password("Password for the imported wallet: ")?;
            let address = wallets.import(&private_key, &password)?;
            println!("{}", address);
        }
        Command::Wallet(WalletCommand::Info { address, check_key }) => {
            let address = resolve_address(&wallets, address)?;
            let password = if check_key {
                Some(read_password("Wallet password: ")?)
            } else {
                None
            };
            let rpc = RpcGateway::connect(&config)?;
            let info = wallets.wallet_info(&address, password.as_ref(), &rpc)?;
            print_json(&info)?;
        }
        Command::Wallet(WalletCommand::List) => {
            print_json(&wallets.list()?)?;
        }
        Command::Wallet(WalletCommand::SetDefault { address }) => {
            wallets.set_default(&address)?;
            println!("Default wallet set to {}", address);
        }
        Command::Tx(TxCommand::Send { to, amount, from }) => {
            let from = resolve_address(&wallets, from)?;
            let password = read_password("Wallet password: ")?;
            let rpc = RpcGateway::connect(&config)?;
            let manager = TransactionManager::new(&rpc, &wallets, &config)?;
            let receipt = manager.send_transaction(&from, &to, &amount, &password)?;
            print_json(&receipt)?;
        }
        Command::Tx(TxCommand::Status { tx_hash }) => {
            let rpc = RpcGateway::connect(&config)?;
            let manager = TransactionManager::new(&rpc, &wallets, &config)?;
            print_json(&manager.check_status(&tx_hash)?)?;
        }
        Command::Tx(TxCommand::History {
            address,
            limit,
            export,
        }) => {
            let address = resolve_address(&wallets, address)?;
            let explorer = ExplorerClient::new(&config.explorer, paths.export_dir())?;
            let entries = explorer.history(&address, limit)?;
            print_json(&entries)?;
            if export {
                let path = explorer.export_history(&address, &entries)?;
                eprintln!("Exported to {}", path.display());
            }
        }
        Command::Network(NetworkCommand::Info) => {
            let rpc = RpcGateway::connect(&config)?;
            print_json(&rpc.network_info())?;
            print_json(&rpc.get_stats())?;
        }
    }
    Ok(())
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Ok(dir) = std::env::var("ETHWALLET_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".ethwallet"),
        _ => PathBuf::from(".ethwallet"),
    }
}

fn resolve_address(wallets: &WalletManager, explicit: Option<String>) -> WalletResult<String> {
    match explicit {
        Some(address) => Ok(address),
        None => wallets.default_wallet(),
    }
}

/// Read a password from $ETHWALLET_PASSWORD or, failing that, a stdin
/// prompt.
fn read_password(prompt: &str) -> WalletResult<SecretString> {
    if let Ok(password) = std::env::var("ETHWALLET_PASSWORD") {
        if !password.is_empty() {
            return Ok(SecretString::from(password));
        }
    }
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(SecretString::from(line.trim_end().to_string()))
}

fn print_json(value: &impl serde::Serialize) -> WalletResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
