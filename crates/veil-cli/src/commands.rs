//! Command implementations. Output goes to the supplied writer.

use std::io::{self, Write};

use thiserror::Error;
use veil_core::{
    Environment, Identity, IdentityOrigin, IdentityStore, LinkError, RoomLink, SessionError,
    SystemEnv,
    storage::{RedbKeyStore, StorageError},
};
use veil_crypto::{
    CryptoError, EncodedPublicKey, EncryptedEnvelope, SymmetricKey, decrypt, derive_shared_key,
    encrypt,
};

use crate::cli::{Args, Command, ConversationCommand, IdentityCommand, RoomCommand};

const IDENTITY_DB: &str = "identity.redb";

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Identity, key or transport failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Malformed key or failed decryption.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Unusable room link.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Identity database failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Envelope argument is not valid JSON.
    #[error("invalid envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// Writing output or creating the data directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `identity reset` without `--yes`.
    #[error("refusing to replace the identity without --yes")]
    Unconfirmed,
}

/// Execute the parsed command.
pub fn run(args: &Args, out: &mut impl Write) -> Result<(), CommandError> {
    let env = SystemEnv::new();

    match &args.command {
        Command::Identity(IdentityCommand::Show) => {
            let identity = load_identity(args, &env)?;
            let origin = match identity.origin() {
                IdentityOrigin::Created => "created",
                IdentityOrigin::Loaded => "loaded",
            };
            tracing::info!(origin, "device identity ready");
            writeln!(out, "{}", identity.public_key())?;
            writeln!(out, "origin: {origin}")?;
        },
        Command::Identity(IdentityCommand::Reset { yes }) => {
            if !yes {
                return Err(CommandError::Unconfirmed);
            }
            let identity = identity_store(args)?.replace(&env)?;
            writeln!(out, "{}", identity.public_key())?;
        },
        Command::Room(RoomCommand::New) => {
            let link = RoomLink::create(&args.base_url, &env);
            writeln!(out, "{}", link.to_url())?;
        },
        Command::Room(RoomCommand::Seal { link, message }) => {
            let link = RoomLink::parse(link)?;
            seal(message, link.key().key(), &env, out)?;
        },
        Command::Room(RoomCommand::Open { link, envelope }) => {
            let link = RoomLink::parse(link)?;
            open(envelope, link.key().key(), out)?;
        },
        Command::Conversation(ConversationCommand::Seal { peer_key, message }) => {
            let key = conversation_key(args, &env, peer_key)?;
            seal(message, &key, &env, out)?;
        },
        Command::Conversation(ConversationCommand::Open { peer_key, envelope }) => {
            let key = conversation_key(args, &env, peer_key)?;
            open(envelope, &key, out)?;
        },
    }

    Ok(())
}

fn identity_store(args: &Args) -> Result<IdentityStore<RedbKeyStore>, CommandError> {
    std::fs::create_dir_all(&args.data_dir)?;
    let storage = RedbKeyStore::open(args.data_dir.join(IDENTITY_DB))?;
    Ok(IdentityStore::new(storage))
}

fn load_identity(args: &Args, env: &SystemEnv) -> Result<Identity, CommandError> {
    match identity_store(args)?.load_or_create(env) {
        Ok(identity) => Ok(identity),
        Err(err @ SessionError::IdentityCorrupt { .. }) => {
            tracing::warn!(
                "stored identity is unreadable; `veil identity reset --yes` replaces it and \
                 makes existing conversations unreadable"
            );
            Err(err.into())
        },
        Err(err) => Err(err.into()),
    }
}

fn conversation_key(
    args: &Args,
    env: &SystemEnv,
    peer_key: &str,
) -> Result<SymmetricKey, CommandError> {
    let identity = load_identity(args, env)?;
    Ok(derive_shared_key(identity.key_pair(), &EncodedPublicKey::new(peer_key))?)
}

fn seal(
    message: &str,
    key: &SymmetricKey,
    env: &SystemEnv,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let envelope = encrypt(message, key, &mut env.rng())?;
    writeln!(out, "{}", serde_json::to_string(&envelope)?)?;
    Ok(())
}

fn open(envelope: &str, key: &SymmetricKey, out: &mut impl Write) -> Result<(), CommandError> {
    let envelope: EncryptedEnvelope = serde_json::from_str(envelope)?;
    let plaintext = decrypt(&envelope, key)?;
    writeln!(out, "{plaintext}")?;
    Ok(())
}
