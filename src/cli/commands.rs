//! CLI commands for the vault
//!
//! Implements all command handlers for the CLI interface. Every handler that
//! changes the vault loads the snapshot, applies one operation and saves it
//! back.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::address::{Address, TokenRef};
use crate::crypto::{derive_vault_address, KeyPair};
use crate::custody::{CustodyLayer, Treasury};
use crate::storage::{Storage, StorageConfig, VaultSnapshot};
use crate::vault::{Action, ActionDigest, ActionPayload, Expiration, ProposalRequest, Vault};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub vault: Vault<Treasury>,
    pub storage: Storage,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load an initialized vault from `data_dir`
    pub fn load(data_dir: PathBuf) -> CliResult<Self> {
        let storage = Storage::new(storage_config(&data_dir))?;

        if !storage.exists() {
            return Err(format!(
                "no vault at {:?}; create one with: vault init --signer <ADDR> ... --threshold <M>",
                data_dir
            )
            .into());
        }

        let vault = storage.load()?.into_vault();
        Ok(Self {
            vault,
            storage,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&VaultSnapshot::from_vault(&self.vault))?;
        Ok(())
    }
}

fn storage_config(data_dir: &Path) -> StorageConfig {
    StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    }
}

/// Build an optional expiration from the two mutually exclusive flags
pub fn parse_expiration(
    at_height: Option<u64>,
    at_time: Option<&str>,
) -> CliResult<Option<Expiration>> {
    match (at_height, at_time) {
        (Some(_), Some(_)) => Err("use either --expires-at-height or --expires-at, not both".into()),
        (Some(height), None) => Ok(Some(Expiration::AtHeight(height))),
        (None, Some(raw)) => {
            let deadline = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| format!("invalid --expires-at {:?}: {}", raw, e))?
                .with_timezone(&Utc);
            Ok(Some(Expiration::AtTime(deadline)))
        }
        (None, None) => Ok(None),
    }
}

/// Decode hex signatures; undecodable entries become empty and are later
/// skipped as malformed
pub fn parse_signatures(raw: &[String]) -> Vec<Vec<u8>> {
    raw.iter()
        .map(|sig| {
            hex::decode(sig.trim_start_matches("0x")).unwrap_or_else(|e| {
                log::warn!("Ignoring signature {:?}: {}", sig, e);
                Vec::new()
            })
        })
        .collect()
}

/// Generate a signer key pair
pub fn cmd_keygen() -> CliResult<KeyPair> {
    let keys = KeyPair::generate();

    println!("🔐 New signer key generated!");
    println!("   📍 Address: {}", keys.address());
    println!("   🔑 Public Key: {}", keys.public_key_hex());
    println!("   🗝️  Private Key: {}", keys.private_key_hex());
    println!("\n   ⚠️  IMPORTANT: Store the private key safely, it is not saved anywhere.");

    Ok(keys)
}

/// Create and initialize a new vault
pub fn cmd_init(data_dir: &Path, signers: &[String], threshold: u32) -> CliResult<()> {
    let storage = Storage::new(storage_config(data_dir))?;

    if storage.exists() {
        println!("⚠️  Vault already exists at {:?}", data_dir);
        return Ok(());
    }

    let signers = signers
        .iter()
        .map(|s| s.parse::<Address>())
        .collect::<Result<Vec<_>, _>>()?;
    let address = derive_vault_address(&signers, threshold);

    let mut vault = Vault::new(address, Treasury::new());
    vault.initialize(signers, threshold)?;
    storage.save(&VaultSnapshot::from_vault(&vault))?;

    println!("✅ Vault initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   📍 Vault address: {}", vault.address());
    println!("   🔧 Policy: {}", vault.registry().description());
    for signer in vault.signers() {
        println!("   └─ {}", signer);
    }

    Ok(())
}

/// List backups, or replace the current vault with backup `index`
///
/// Works without loading the current vault file, so an unreadable one can be
/// recovered.
pub fn cmd_restore(data_dir: &Path, index: Option<usize>) -> CliResult<()> {
    let storage = Storage::new(storage_config(data_dir))?;

    let index = match index {
        Some(index) => index,
        None => {
            let backups = storage.list_backups();
            if backups.is_empty() {
                println!("📭 No backups in {:?}", data_dir);
            }
            for index in backups {
                match storage.restore_backup(index) {
                    Ok(snapshot) => println!(
                        "   [{}] saved {} | {} actions",
                        index,
                        snapshot.saved_at.format("%Y-%m-%d %H:%M:%S"),
                        snapshot.state.ledger().len()
                    ),
                    Err(e) => println!("   [{}] unreadable: {}", index, e),
                }
            }
            return Ok(());
        }
    };

    let snapshot = storage.restore_backup(index)?;
    storage.save(&snapshot)?;
    log::info!("Restored vault {} from backup {}", snapshot.state.address, index);

    println!("♻️  Vault restored from backup {}", index);
    println!("   📍 Vault address: {}", snapshot.state.address);
    println!("   📋 Actions: {}", snapshot.state.ledger().len());
    Ok(())
}

/// Display vault information
pub fn cmd_status(state: &AppState) -> CliResult<()> {
    let vault = &state.vault;
    let ledger = vault.ledger();

    println!("🏦 Vault Info");
    println!("   ├─ Address: {}", vault.address());
    println!(
        "   ├─ Policy: {} (registry version {})",
        vault.registry().description(),
        vault.registry().version()
    );
    println!("   ├─ Balance: {}", vault.balance());
    println!("   ├─ Height: {}", vault.height());
    println!(
        "   ├─ Actions: {} ({} pending)",
        ledger.len(),
        ledger.pending().count()
    );
    println!("   └─ Signers:");
    for signer in vault.signers() {
        println!("      └─ {}", signer);
    }

    let tokens = vault.custody().tokens.tokens_for_holder(vault.address());
    if !tokens.is_empty() {
        println!("\n   Token balances:");
        for (token, balance) in tokens {
            println!("   └─ {} {} ({})", balance, token.symbol(), token.address);
        }
    }

    Ok(())
}

/// Deposit native coin into the vault
pub fn cmd_fund(state: &mut AppState, amount: u128) -> CliResult<()> {
    let address = state.vault.address().clone();
    let balance = state.vault.custody_mut().deposit(&address, amount)?;
    state.save()?;

    println!("💰 Deposited {} into {}", amount, address);
    println!("   New balance: {}", balance);
    Ok(())
}

/// Create a token, issuing the whole supply to `issuer` (the vault by default)
pub fn cmd_token_create(
    state: &mut AppState,
    name: &str,
    symbol: &str,
    decimals: u8,
    supply: u128,
    issuer: Option<&str>,
) -> CliResult<TokenRef> {
    let issuer = match issuer {
        Some(raw) => raw.parse::<Address>()?,
        None => state.vault.address().clone(),
    };

    let token = state.vault.custody_mut().tokens.create_token(
        name.to_string(),
        symbol.to_string(),
        decimals,
        supply,
        &issuer,
    )?;
    state.save()?;

    println!("🪙 Token created!");
    println!("   Address: {}", token.address);
    println!("   {} ({}), {} decimals", token.name(), token.symbol(), decimals);
    println!("   Supply of {} issued to {}", supply, issuer);
    Ok(token.address)
}

/// Move tokens from a holder into the vault
pub fn cmd_token_fund(
    state: &mut AppState,
    token: &str,
    from: &str,
    amount: u128,
) -> CliResult<()> {
    let token: TokenRef = token.parse()?;
    let from: Address = from.parse()?;
    let vault_address = state.vault.address().clone();

    state
        .vault
        .custody_mut()
        .transfer_token(&token, &from, &vault_address, amount)?;
    state.save()?;

    println!("💰 Moved {} of {} from {} into the vault", amount, token, from);
    Ok(())
}

/// Show a token balance (the vault's by default)
pub fn cmd_token_balance(state: &AppState, token: &str, holder: Option<&str>) -> CliResult<()> {
    let token: TokenRef = token.parse()?;
    let holder = match holder {
        Some(raw) => raw.parse::<Address>()?,
        None => state.vault.address().clone(),
    };

    let custody = state.vault.custody();
    let symbol = custody
        .tokens
        .get(&token)
        .map(|t| t.symbol().to_string())
        .ok_or_else(|| format!("unknown token: {}", token))?;

    println!("💰 {} holds {} {}", holder, custody.token_balance(&token, &holder), symbol);
    Ok(())
}

/// Propose an action on behalf of `caller`
pub fn cmd_propose(state: &mut AppState, caller: &str, request: ProposalRequest) -> CliResult<u64> {
    let caller: Address = caller.parse()?;
    let id = state.vault.propose(&caller, request)?;
    state.save()?;

    let digest = state.vault.digest(id)?;
    println!("📝 Action {} proposed", id);
    print_action(state.vault.get(id)?);
    println!("\n   Digest to sign: {}", digest);
    Ok(id)
}

fn print_action(action: &Action) {
    println!("   ├─ Kind: {}", action.kind());
    match &action.payload {
        ActionPayload::NativeTransfer { amount, recipient } => {
            println!("   ├─ Amount: {}", amount);
            println!("   ├─ Recipient: {}", recipient);
        }
        ActionPayload::TokenTransfer {
            token,
            amount,
            recipient,
        } => {
            println!("   ├─ Token: {}", token);
            println!("   ├─ Amount: {}", amount);
            println!("   ├─ Recipient: {}", recipient);
        }
        ActionPayload::ConfigChange { signers, threshold } => {
            println!("   ├─ New policy: {}-of-{}", threshold, signers.len());
            for signer in signers {
                println!("   │  └─ {}", signer);
            }
        }
    }
    if let Some(expiration) = &action.expiration {
        println!("   ├─ Expires at: {}", expiration);
    }
    println!("   ├─ Proposer: {}", action.proposer);
    println!(
        "   ├─ Proposed: {}",
        action.proposed_at.format("%Y-%m-%d %H:%M:%S")
    );
    match &action.executed_by {
        Some(by) => println!("   └─ Status: {:?} by {}", action.status(), by),
        None => println!("   └─ Status: {:?}", action.status()),
    }
}

/// Show a single action
pub fn cmd_show(state: &AppState, id: u64) -> CliResult<()> {
    let action = state.vault.get(id)?;
    println!("📄 Action {}", id);
    print_action(action);
    println!("\n   Digest: {}", state.vault.digest(id)?);
    Ok(())
}

/// List all actions
pub fn cmd_list(state: &AppState) -> CliResult<()> {
    let ledger = state.vault.ledger();
    if ledger.is_empty() {
        println!("📭 No actions proposed yet.");
        return Ok(());
    }

    println!("📋 Actions ({}):", ledger.len());
    for action in ledger.iter() {
        let detail = match (action.amount(), action.recipient()) {
            (Some(amount), Some(recipient)) => format!("{} -> {}", amount, recipient),
            _ => match &action.payload {
                ActionPayload::ConfigChange { signers, threshold } => {
                    format!("{}-of-{}", threshold, signers.len())
                }
                _ => String::new(),
            },
        };
        println!(
            "   #{} | {} | {} | {:?}",
            action.id,
            action.kind(),
            detail,
            action.status()
        );
    }

    Ok(())
}

/// Print the digest of an action
pub fn cmd_digest(state: &AppState, id: u64) -> CliResult<ActionDigest> {
    let digest = state.vault.digest(id)?;
    println!("{}", digest);
    Ok(digest)
}

/// Sign the digest of an action with a private key
pub fn cmd_sign(state: &AppState, id: u64, private_key: &str) -> CliResult<String> {
    let keys = KeyPair::from_private_key_hex(private_key)?;
    let digest = state.vault.digest(id)?;
    let signature = hex::encode(keys.sign_recoverable(digest.as_bytes())?);

    if !state.vault.is_member(&keys.address()) {
        println!("⚠️  {} is not a current signer; this signature will not count", keys.address());
    }
    println!("✍️  Signature by {} for action {}:", keys.address(), id);
    println!("{}", signature);
    Ok(signature)
}

/// Recover the signer of a digest
pub fn cmd_recover(state: &AppState, digest: &str, signature: &str) -> CliResult<Address> {
    let digest: ActionDigest = digest.parse()?;
    let signature = hex::decode(signature.trim_start_matches("0x"))?;
    let signer = state.vault.recover(&digest, &signature)?;

    let role = if state.vault.is_member(&signer) {
        "current signer"
    } else {
        "not a signer"
    };
    println!("🔎 Recovered {} ({})", signer, role);
    Ok(signer)
}

/// Count distinct valid signatures for an action
pub fn cmd_count(state: &AppState, id: u64, signatures: &[String]) -> CliResult<usize> {
    let tally = state.vault.tally(id, &parse_signatures(signatures))?;
    let threshold = state.vault.threshold();

    println!("🧮 Action {}: {}/{} signatures", id, tally.count(), threshold);
    for signer in &tally.signers {
        println!("   ✓ {}", signer);
    }
    if tally.skipped_malformed > 0 {
        println!("   {} malformed signature(s) ignored", tally.skipped_malformed);
    }
    if tally.skipped_non_members > 0 {
        println!("   {} signature(s) from non-signers ignored", tally.skipped_non_members);
    }
    if tally.meets(threshold) {
        println!("\n✅ Quorum reached");
    }
    Ok(tally.count())
}

/// Cancel a pending action
pub fn cmd_cancel(state: &mut AppState, caller: &str, id: u64) -> CliResult<()> {
    let caller: Address = caller.parse()?;
    state.vault.cancel(&caller, id)?;
    state.save()?;

    println!("🚫 Action {} cancelled", id);
    Ok(())
}

/// Execute an action with the collected signatures
pub fn cmd_execute(
    state: &mut AppState,
    caller: &str,
    id: u64,
    signatures: &[String],
) -> CliResult<()> {
    let caller: Address = caller.parse()?;
    state.vault.execute(&caller, id, &parse_signatures(signatures))?;
    state.save()?;

    println!("✅ Action {} executed", id);
    print_action(state.vault.get(id)?);
    Ok(())
}

/// Report the current ledger height
pub fn cmd_height(state: &mut AppState, height: Option<u64>) -> CliResult<()> {
    if let Some(height) = height {
        state.vault.observe_height(height);
        state.save()?;
    }
    println!("📏 Height: {}", state.vault.height());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::VaultError;

    fn setup() -> (tempfile::TempDir, Vec<KeyPair>) {
        let temp_dir = tempfile::tempdir().unwrap();
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let signers: Vec<String> = keys.iter().map(|k| k.address().to_string()).collect();
        cmd_init(temp_dir.path(), &signers, 2).unwrap();
        (temp_dir, keys)
    }

    #[test]
    fn test_load_requires_init() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(AppState::load(temp_dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_native_transfer_flow() {
        let (temp_dir, keys) = setup();
        let caller = keys[0].address().to_string();

        let mut state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        cmd_fund(&mut state, 5000).unwrap();
        let id = cmd_propose(
            &mut state,
            &caller,
            ProposalRequest::native(1000, Address::new("bob")),
        )
        .unwrap();

        // Each command reloads from disk, as separate invocations would
        let state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        let sigs = vec![
            cmd_sign(&state, id, &keys[0].private_key_hex()).unwrap(),
            cmd_sign(&state, id, &keys[2].private_key_hex()).unwrap(),
            "not-hex".to_string(),
        ];
        assert_eq!(cmd_count(&state, id, &sigs).unwrap(), 2);

        let mut state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        cmd_execute(&mut state, &caller, id, &sigs).unwrap();

        let state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(state.vault.balance(), 4000);
        assert!(state.vault.get(id).unwrap().is_executed());
    }

    #[test]
    fn test_failed_execution_is_not_saved() {
        let (temp_dir, keys) = setup();
        let caller = keys[0].address().to_string();

        let mut state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        let id = cmd_propose(
            &mut state,
            &caller,
            ProposalRequest::native(10, Address::new("bob")),
        )
        .unwrap();
        let sigs = vec![
            cmd_sign(&state, id, &keys[0].private_key_hex()).unwrap(),
            cmd_sign(&state, id, &keys[1].private_key_hex()).unwrap(),
        ];

        let err = cmd_execute(&mut state, &caller, id, &sigs).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VaultError>(),
            Some(VaultError::TransferFailed(_))
        ));

        let state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        assert!(state.vault.get(id).unwrap().is_pending());
    }

    #[test]
    fn test_token_commands() {
        let (temp_dir, keys) = setup();
        let caller = keys[1].address().to_string();

        let mut state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        let token = cmd_token_create(&mut state, "Vault Dollar", "VUSD", 6, 1000, Some("issuer")).unwrap();
        cmd_token_fund(&mut state, token.as_str(), "issuer", 400).unwrap();
        cmd_token_balance(&state, token.as_str(), None).unwrap();

        let id = cmd_propose(
            &mut state,
            &caller,
            ProposalRequest::token(token.clone(), 150, Address::new("bob")),
        )
        .unwrap();
        let sigs = vec![
            cmd_sign(&state, id, &keys[1].private_key_hex()).unwrap(),
            cmd_sign(&state, id, &keys[2].private_key_hex()).unwrap(),
        ];
        cmd_execute(&mut state, &caller, id, &sigs).unwrap();

        let custody = state.vault.custody();
        assert_eq!(custody.token_balance(&token, state.vault.address()), 250);
        assert_eq!(custody.token_balance(&token, &Address::new("bob")), 150);
    }

    #[test]
    fn test_recover_and_height() {
        let (temp_dir, keys) = setup();
        let mut state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        let id = cmd_propose(
            &mut state,
            &keys[0].address().to_string(),
            ProposalRequest::native(1, Address::new("bob")).expires(Expiration::AtHeight(5)),
        )
        .unwrap();

        let digest = cmd_digest(&state, id).unwrap();
        let sig = cmd_sign(&state, id, &keys[2].private_key_hex()).unwrap();
        assert_eq!(
            cmd_recover(&state, &digest.to_hex(), &sig).unwrap(),
            keys[2].address()
        );
        assert!(cmd_recover(&state, &digest.to_hex(), "abcd").is_err());

        cmd_height(&mut state, Some(5)).unwrap();
        let state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(state.vault.height(), 5);
    }

    #[test]
    fn test_restore_unreadable_vault() {
        let (temp_dir, keys) = setup();
        let mut state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        let id = cmd_propose(
            &mut state,
            &keys[0].address().to_string(),
            ProposalRequest::native(1, Address::new("bob")),
        )
        .unwrap();

        std::fs::write(temp_dir.path().join("vault.json"), b"{\"state\"").unwrap();
        assert!(AppState::load(temp_dir.path().to_path_buf()).is_err());

        cmd_restore(temp_dir.path(), None).unwrap();
        cmd_restore(temp_dir.path(), Some(0)).unwrap();
        let state = AppState::load(temp_dir.path().to_path_buf()).unwrap();
        assert!(state.vault.get(id).is_err());
        assert_eq!(state.vault.next_id(), 0);

        // Backup 0 now holds the unreadable file; listing still works
        cmd_restore(temp_dir.path(), None).unwrap();
        assert!(cmd_restore(temp_dir.path(), Some(0)).is_err());
        assert!(cmd_restore(temp_dir.path(), Some(4)).is_err());
    }

    #[test]
    fn test_parse_expiration() {
        assert_eq!(parse_expiration(None, None).unwrap(), None);
        assert_eq!(
            parse_expiration(Some(9), None).unwrap(),
            Some(Expiration::AtHeight(9))
        );
        assert!(matches!(
            parse_expiration(None, Some("2030-01-01T00:00:00Z")).unwrap(),
            Some(Expiration::AtTime(_))
        ));
        assert!(parse_expiration(None, Some("tomorrow")).is_err());
        assert!(parse_expiration(Some(1), Some("2030-01-01T00:00:00Z")).is_err());
    }
}
