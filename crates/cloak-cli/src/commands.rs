//! Subcommand implementations.
//!
//! Each command writes its result to `out` so it can be tested against an
//! in-memory buffer; diagnostics go through `tracing`.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use cloak_core::{
    ActionId, GroupId, MembershipProof, MerkleTree, Padding, RotationPolicy, Seed,
    SessionKeyManager, derive_nullifier, generate_seed, verify_membership,
};
use cloak_crypto::{CryptoProvider, RustCryptoProvider, Sha256Hasher};

use crate::{error::CliError, system_env::SystemEnv};

const IDENTITY_DOMAIN: &[u8] = b"cloak/cli/identity";
const GROUP_DOMAIN: &[u8] = b"cloak/cli/group";

/// Print a fresh nullifier seed.
pub fn seed(out: &mut impl Write) -> Result<(), CliError> {
    let seed = generate_seed()?;
    writeln!(out, "{}", seed.to_hex())?;
    Ok(())
}

/// Print the root of the member set in `members`.
pub fn root(members: &Path, zero_padding: bool, out: &mut impl Write) -> Result<(), CliError> {
    let tree = build_tree(members, zero_padding)?;
    writeln!(out, "{}", tree.root())?;
    Ok(())
}

/// Write a CBOR membership proof for `id` to `proof_path` and print the root.
pub fn prove(
    members: &Path,
    id: &str,
    proof_path: &Path,
    zero_padding: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let tree = build_tree(members, zero_padding)?;
    let proof = tree
        .prove_membership(id.as_bytes())
        .into_proof()
        .ok_or_else(|| CliError::NotAMember { id: id.to_string() })?;

    let mut writer = BufWriter::new(File::create(proof_path)?);
    ciborium::into_writer(&proof, &mut writer)?;
    writer.flush()?;

    tracing::info!(index = proof.index, root = %proof.root, "Wrote membership proof");
    writeln!(out, "{}", proof.root)?;
    Ok(())
}

/// Verify the CBOR proof in `proof_path`. Prints and returns the verdict.
pub fn verify(proof_path: &Path, out: &mut impl Write) -> Result<bool, CliError> {
    let reader = BufReader::new(File::open(proof_path)?);
    let proof: MembershipProof = ciborium::from_reader(reader)?;

    let valid = verify_membership(&Sha256Hasher, &proof);
    writeln!(out, "{}", if valid { "valid" } else { "invalid" })?;
    Ok(valid)
}

/// Print the nullifier for a hex seed, group id and action id.
pub fn nullifier(
    seed: &str,
    group: &str,
    action: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let seed = Seed::from_hex(seed).map_err(|source| CliError::Hex { field: "seed", source })?;
    let group = GroupId::new(parse_hex32("group", group)?);
    let action = ActionId::new(parse_hex32("action", action)?);

    writeln!(out, "{}", derive_nullifier(&Sha256Hasher, &seed, &group, &action))?;
    Ok(())
}

/// Encrypt and decrypt `messages` messages in a fresh group and print the
/// rotation history.
pub async fn session_demo(
    policy: RotationPolicy,
    messages: usize,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let provider = RustCryptoProvider::new();

    // One random seed yields both the demo identity and the demo group
    let seed = generate_seed()?;
    let identity = provider
        .hash(IDENTITY_DOMAIN, seed.expose_secret())
        .await
        .map_err(cloak_core::SessionError::from)?;
    let group = provider
        .hash(GROUP_DOMAIN, seed.expose_secret())
        .await
        .map_err(cloak_core::SessionError::from)?;
    let group = GroupId::new(*group.as_bytes());

    let mut manager = SessionKeyManager::new(provider, SystemEnv::new(), policy, identity);
    manager.initialize_group(group).await?;

    for i in 0..messages {
        let plaintext = format!("message {i}");
        let sealed = manager.encrypt(group, plaintext.as_bytes()).await?;
        let opened = manager.decrypt(group, &sealed).await?;
        tracing::debug!(
            message = i,
            generation = sealed.generation,
            key_id = %sealed.key_id,
            roundtrip = opened == plaintext.as_bytes(),
            "Sealed demo message"
        );
    }

    writeln!(
        out,
        "group {group}: {messages} messages, generation {}",
        manager.current_generation(&group)?
    )?;
    for event in manager.history(&group) {
        writeln!(
            out,
            "generation {:>3}  {:<12}  {} -> {}",
            event.generation,
            event.reason.as_str(),
            event.old_key_id,
            event.new_key_id
        )?;
    }
    Ok(())
}

fn build_tree(members: &Path, zero_padding: bool) -> Result<MerkleTree, CliError> {
    let text = std::fs::read_to_string(members)?;
    let members = parse_members(&text);
    let padding = if zero_padding { Padding::ZeroLeaf } else { Padding::RepeatLastLeaf };

    Ok(MerkleTree::build_with(Sha256Hasher, padding, &members)?)
}

/// One identifier per line; blank lines are skipped.
fn parse_members(text: &str) -> Vec<&str> {
    text.lines().filter(|line| !line.is_empty()).collect()
}

fn parse_hex32(field: &'static str, value: &str) -> Result<[u8; 32], CliError> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(value, &mut bytes).map_err(|source| CliError::Hex { field, source })?;
    Ok(bytes)
}
