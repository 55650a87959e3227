//! Command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use docseal_core::codec::Utf8Codec;
use docseal_core::store::wipe_document;
use docseal_core::{
    DocsealError, DocumentStore, EncryptedDocumentStore, EncryptedStoreBuilder, KeysetStatus,
    SecureKeyStore, SharedKeyStore, StoragePaths,
};
use eyre::{eyre, WrapErr as _};

use crate::keystore::FileKeyStore;
use crate::{Cli, Command, DocumentArgs};

const ROOT_DIRNAME: &str = "docseal";

struct Env {
    paths: StoragePaths,
    key_store: Arc<FileKeyStore>,
    shared_key_store: SharedKeyStore,
}

impl Env {
    fn new(root: Option<PathBuf>) -> eyre::Result<Self> {
        let root = match root {
            Some(root) => root,
            None => dirs::data_dir()
                .map(|dir| dir.join(ROOT_DIRNAME))
                .ok_or_else(|| eyre!("no data directory on this platform; pass --root"))?,
        };
        let paths = StoragePaths::new(root);
        let key_store = Arc::new(FileKeyStore::new(paths.keystore_dir()));
        let shared_key_store = SharedKeyStore::new(key_store.clone());
        Ok(Self {
            paths,
            key_store,
            shared_key_store,
        })
    }

    fn document(&self, args: &DocumentArgs) -> EncryptedDocumentStore<Utf8Codec> {
        EncryptedStoreBuilder::new(&args.name, Utf8Codec::default(), args.master_key_alias())
            .build(&self.paths, self.shared_key_store.clone())
    }
}

/// Runs the parsed command.
pub async fn run(cli: Cli) -> eyre::Result<()> {
    let env = Env::new(cli.root)?;
    tracing::debug!(root = %env.paths.root().display(), "using storage root");

    match cli.command {
        Command::Write { document, value } => {
            env.document(&document)
                .update(Box::new(move |_| value))
                .await
                .map_err(|err| explain(err, &document))?;
            println!("wrote `{}`", document.name);
        }
        Command::Read { document } => {
            let value = env
                .document(&document)
                .read()
                .await
                .map_err(|err| explain(err, &document))?;
            println!("{value}");
        }
        Command::Status { document } => {
            let status = env
                .document(&document)
                .codec()
                .aead_provider()
                .keyset_provider()
                .status()
                .await
                .wrap_err("failed to resolve keyset status")?;
            println!("{}", describe(&status));
        }
        Command::Wipe { name } => {
            wipe_document(&env.paths, &name)
                .await
                .wrap_err_with(|| format!("failed to wipe `{name}`"))?;
            println!("wiped `{name}`");
        }
        Command::ForgetMasterKey { alias } => {
            env.key_store
                .delete_key(&alias)
                .await
                .wrap_err_with(|| format!("failed to delete master key `{alias}`"))?;
            println!("deleted master key `{alias}`");
        }
    }
    Ok(())
}

fn explain(err: DocsealError, document: &DocumentArgs) -> eyre::Report {
    let hint = match &err {
        DocsealError::UnrecoverableKeyLoss { .. } | DocsealError::Corruption { .. } => format!(
            "`{}` cannot be decrypted; run `docseal wipe {}` to start over",
            document.name, document.name
        ),
        _ => format!("failed to access `{}`", document.name),
    };
    eyre::Report::new(err).wrap_err(hint)
}

const fn describe(status: &KeysetStatus) -> &'static str {
    match status {
        KeysetStatus::Stored(_) => "stored: keyset and master key present",
        KeysetStatus::NotStored => "not stored: nothing provisioned yet",
        KeysetStatus::StoredButMasterKeyMissing => {
            "master key missing: the keyset can no longer be decrypted"
        }
        KeysetStatus::NotStoredButMasterKeyStored => {
            "no keyset: the master key exists and will be reused"
        }
    }
}
