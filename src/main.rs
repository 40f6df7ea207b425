//! Threshold Vault CLI Application
//!
//! A command-line interface for operating an M-of-N signer vault.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use threshold_vault::address::{Address, TokenRef};
use threshold_vault::cli::{self, AppState};
use threshold_vault::vault::ProposalRequest;

#[derive(Parser)]
#[command(name = "vault")]
#[command(version = "0.1.0")]
#[command(about = "An M-of-N threshold-signature vault", long_about = None)]
struct Cli {
    /// Data directory for vault storage
    #[arg(short, long, default_value = ".vault_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signer key pair
    Keygen,

    /// Create a new vault
    Init {
        /// Signer address (repeat for each signer)
        #[arg(short, long = "signer", required = true)]
        signers: Vec<String>,

        /// Number of signatures required to execute an action
        #[arg(short, long)]
        threshold: u32,
    },

    /// Display vault information
    Status,

    /// Deposit native coin into the vault
    Fund {
        /// Amount to deposit
        #[arg(short, long)]
        amount: u128,
    },

    /// Token operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Propose a new action
    Propose {
        /// Proposing signer's address
        #[arg(short, long)]
        caller: String,

        /// Ledger height at which the action expires
        #[arg(long, conflicts_with = "expires_at")]
        expires_at_height: Option<u64>,

        /// RFC 3339 time at which the action expires
        #[arg(long)]
        expires_at: Option<String>,

        #[command(subcommand)]
        action: ProposeCommands,
    },

    /// Show an action
    Show {
        /// Action id
        #[arg(short, long)]
        id: u64,
    },

    /// List all actions
    List,

    /// Print the digest signers must sign for an action
    Digest {
        /// Action id
        #[arg(short, long)]
        id: u64,
    },

    /// Sign an action's digest
    Sign {
        /// Action id
        #[arg(short, long)]
        id: u64,

        /// Signer's private key (hex)
        #[arg(short, long)]
        private_key: String,
    },

    /// Recover the signer of a digest
    Recover {
        /// Digest (hex)
        #[arg(short, long)]
        digest: String,

        /// Recoverable signature (hex)
        #[arg(short, long)]
        signature: String,
    },

    /// Count distinct valid signatures for an action
    Count {
        /// Action id
        #[arg(short, long)]
        id: u64,

        /// Signature (hex, repeat for each)
        #[arg(short, long = "sig")]
        sigs: Vec<String>,
    },

    /// Cancel a pending action
    Cancel {
        /// Cancelling signer's address
        #[arg(short, long)]
        caller: String,

        /// Action id
        #[arg(short, long)]
        id: u64,
    },

    /// Execute an action once enough signatures are collected
    Execute {
        /// Executing principal's address
        #[arg(short, long)]
        caller: String,

        /// Action id
        #[arg(short, long)]
        id: u64,

        /// Signature (hex, repeat for each)
        #[arg(short, long = "sig")]
        sigs: Vec<String>,
    },

    /// List backups, or restore the vault from one
    Restore {
        /// Backup index (0 is the most recent); lists backups when omitted
        #[arg(short, long)]
        backup: Option<usize>,
    },

    /// Show or report the current ledger height
    Height {
        /// New height (ignored if lower than the current one)
        #[arg(short, long)]
        set: Option<u64>,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Create a new token
    Create {
        /// Token name
        #[arg(short, long)]
        name: String,

        /// Token symbol
        #[arg(short, long)]
        symbol: String,

        /// Decimal places
        #[arg(short, long, default_value = "18")]
        decimals: u8,

        /// Total supply
        #[arg(long)]
        supply: u128,

        /// Initial holder of the supply (defaults to the vault)
        #[arg(long)]
        issuer: Option<String>,
    },

    /// Move tokens from a holder into the vault
    Fund {
        /// Token address
        #[arg(short, long)]
        token: String,

        /// Current holder
        #[arg(short, long)]
        from: String,

        /// Amount to move
        #[arg(short, long)]
        amount: u128,
    },

    /// Show a token balance
    Balance {
        /// Token address
        #[arg(short, long)]
        token: String,

        /// Holder (defaults to the vault)
        #[arg(long)]
        holder: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProposeCommands {
    /// Transfer native coin out of the vault
    Native {
        /// Recipient's address
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u128,
    },

    /// Transfer tokens out of the vault
    Token {
        /// Token address
        #[arg(short, long)]
        token: String,

        /// Recipient's address
        #[arg(long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u128,
    },

    /// Replace the signer set and threshold
    Config {
        /// New signer address (repeat for each signer)
        #[arg(short, long = "signer", required = true)]
        signers: Vec<String>,

        /// New threshold
        #[arg(short, long)]
        threshold: u32,
    },
}

fn proposal_request(action: ProposeCommands) -> Result<ProposalRequest, Box<dyn std::error::Error>> {
    let request = match action {
        ProposeCommands::Native { to, amount } => {
            ProposalRequest::native(amount, to.parse::<Address>()?)
        }
        ProposeCommands::Token { token, to, amount } => {
            ProposalRequest::token(token.parse::<TokenRef>()?, amount, to.parse::<Address>()?)
        }
        ProposeCommands::Config { signers, threshold } => {
            let signers = signers
                .iter()
                .map(|s| s.parse::<Address>())
                .collect::<Result<Vec<_>, _>>()?;
            ProposalRequest::config_change(signers, threshold)
        }
    };
    Ok(request)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle commands that don't need a vault
    match &cli.command {
        Commands::Keygen => {
            cli::cmd_keygen()?;
            return Ok(());
        }
        Commands::Init { signers, threshold } => {
            return cli::cmd_init(&cli.data_dir, signers, *threshold);
        }
        Commands::Restore { backup } => {
            return cli::cmd_restore(&cli.data_dir, *backup);
        }
        _ => {}
    }

    let mut state = AppState::load(cli.data_dir.clone())?;

    // Process commands
    match cli.command {
        Commands::Keygen | Commands::Init { .. } | Commands::Restore { .. } => unreachable!(),

        Commands::Status => {
            cli::cmd_status(&state)?;
        }

        Commands::Fund { amount } => {
            cli::cmd_fund(&mut state, amount)?;
        }

        Commands::Token { action } => match action {
            TokenCommands::Create {
                name,
                symbol,
                decimals,
                supply,
                issuer,
            } => {
                cli::cmd_token_create(&mut state, &name, &symbol, decimals, supply, issuer.as_deref())?;
            }
            TokenCommands::Fund {
                token,
                from,
                amount,
            } => {
                cli::cmd_token_fund(&mut state, &token, &from, amount)?;
            }
            TokenCommands::Balance { token, holder } => {
                cli::cmd_token_balance(&state, &token, holder.as_deref())?;
            }
        },

        Commands::Propose {
            caller,
            expires_at_height,
            expires_at,
            action,
        } => {
            let mut request = proposal_request(action)?;
            if let Some(expiration) = cli::parse_expiration(expires_at_height, expires_at.as_deref())? {
                request = request.expires(expiration);
            }
            cli::cmd_propose(&mut state, &caller, request)?;
        }

        Commands::Show { id } => {
            cli::cmd_show(&state, id)?;
        }

        Commands::List => {
            cli::cmd_list(&state)?;
        }

        Commands::Digest { id } => {
            cli::cmd_digest(&state, id)?;
        }

        Commands::Sign { id, private_key } => {
            cli::cmd_sign(&state, id, &private_key)?;
        }

        Commands::Recover { digest, signature } => {
            cli::cmd_recover(&state, &digest, &signature)?;
        }

        Commands::Count { id, sigs } => {
            cli::cmd_count(&state, id, &sigs)?;
        }

        Commands::Cancel { caller, id } => {
            cli::cmd_cancel(&mut state, &caller, id)?;
        }

        Commands::Execute { caller, id, sigs } => {
            cli::cmd_execute(&mut state, &caller, id, &sigs)?;
        }

        Commands::Height { set } => {
            cli::cmd_height(&mut state, set)?;
        }
    }

    Ok(())
}
