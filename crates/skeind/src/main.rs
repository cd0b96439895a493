//! `skeind`: store and retrieve JSON documents as resumable chunk sets.
//!
//! # Usage
//!
//! ```text
//! skeind put scene.json --project-id p1 --project-name Tower --author ada
//! skeind get <manifest-id> -o scene.json
//! skeind head <manifest-id>
//! skeind fetch --chunk-set <id> --total 4 -o scene.json
//! skeind pending
//! skeind clear p1
//! ```

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skein_engine::{
    CancelToken, ChunkProgress, DocumentInfo, EngineError, FetchProgress, ManifestOptions,
    SkeinEngine, SkeinNode, StoredDocument, TransferHooks,
};
use skein_meta::{FjallProgressStore, MemoryProgressStore, ProgressStore};
use skein_store::{
    BlobStore, FileBlobStore, MemoryBlobStore, RefreshingClient, StoreError, StoreFactory,
};
use skein_types::{BlobId, ChunkSetId, OwnershipMetadata};
use tracing::{info, warn};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "skeind",
    version,
    about = "Chunked, resumable JSON document transfer"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "SKEIN_CONFIG")]
    config: Option<PathBuf>,

    /// Override data directory.
    #[arg(short, long, global = true, env = "SKEIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep blobs and checkpoints in memory only.
    #[arg(short, long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a JSON document and print its manifest id.
    ///
    /// An interrupted upload of the same content for the same project
    /// resumes where it stopped.
    Put {
        /// JSON file to upload.
        file: PathBuf,

        #[arg(long)]
        project_id: String,

        #[arg(long)]
        project_name: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        folder: Option<String>,

        /// Root transaction of the document's version chain.
        #[arg(long)]
        root: Option<String>,

        /// Document kind recorded on the manifest.
        #[arg(long, default_value = "project")]
        kind: String,

        #[arg(long)]
        thumbnail: Option<String>,

        #[arg(long)]
        owner: Option<String>,

        /// Owner signature; requires `--owner`.
        #[arg(long, requires = "owner")]
        signature: Option<String>,

        /// Retry this many times after a storage failure.
        #[arg(long, default_value = "0")]
        retries: u32,
    },

    /// Download a document through its manifest.
    Get {
        manifest_id: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Re-indent the document.
        #[arg(long)]
        pretty: bool,
    },

    /// Print a manifest without downloading chunks.
    Head { manifest_id: String },

    /// Reassemble a chunk set found by tag search.
    Fetch {
        #[arg(long)]
        chunk_set: String,

        #[arg(long)]
        total: u32,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List interrupted uploads that can be resumed.
    Pending,

    /// Drop the checkpoint of a project.
    Clear { project_id: String },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    // CLI args override config file values.
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    if cli.memory {
        config.storage.backend = "memory".to_string();
    }

    let client = Arc::new(open_blob_store(&config)?);
    let progress = open_progress_store(&config)?;
    let node = SkeinNode::new(config.transfer_config(), client.clone(), progress.clone());

    match cli.command {
        Commands::Put {
            file,
            project_id,
            project_name,
            author,
            folder,
            root,
            kind,
            thumbnail,
            owner,
            signature,
            retries,
        } => {
            let mut doc = DocumentInfo::new(project_id, project_name, author);
            doc.folder = folder;
            doc.root_tx_id = root.map(BlobId::new);
            let options = ManifestOptions {
                data_type: kind,
                thumbnail_id: thumbnail.map(BlobId::new),
                ownership: owner.map(|owner| OwnershipMetadata { owner, signature }),
            };
            cmd_put(&node, &client, &file, &doc, &options, retries).await
        }
        Commands::Get {
            manifest_id,
            output,
            pretty,
        } => cmd_get(&node, &BlobId::new(manifest_id), output.as_deref(), pretty).await,
        Commands::Head { manifest_id } => cmd_head(&node, &BlobId::new(manifest_id)).await,
        Commands::Fetch {
            chunk_set,
            total,
            output,
        } => cmd_fetch(&node, &ChunkSetId::new(chunk_set), total, output.as_deref()).await,
        Commands::Pending => cmd_pending(progress.as_ref()),
        Commands::Clear { project_id } => {
            progress.clear(&project_id)?;
            println!("Cleared checkpoint for {project_id}");
            Ok(())
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// -----------------------------------------------------------------------
// Storage setup
// -----------------------------------------------------------------------

fn open_blob_store(config: &CliConfig) -> Result<RefreshingClient> {
    let factory: StoreFactory = match config.storage.backend.as_str() {
        "memory" => {
            // Rebuilding must not lose what is already stored.
            let shared: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
            Box::new(move || Ok::<_, StoreError>(shared.clone()))
        }
        "file" => {
            let dir = config.blob_dir();
            Box::new(move || {
                Ok::<_, StoreError>(Arc::new(FileBlobStore::new(&dir)?) as Arc<dyn BlobStore>)
            })
        }
        other => anyhow::bail!("unknown storage backend {other:?} (expected \"file\" or \"memory\")"),
    };
    RefreshingClient::new(factory, config.client_max_age()).context("failed to open blob store")
}

fn open_progress_store(config: &CliConfig) -> Result<Arc<dyn ProgressStore>> {
    if config.storage.backend == "memory" {
        return Ok(Arc::new(MemoryProgressStore::default()));
    }
    let path = config.progress_dir();
    let store = FjallProgressStore::open(&path).map_err(|e| {
        anyhow::anyhow!(
            "cannot open checkpoint store at {}. Is another skeind running? ({e})",
            path.display(),
        )
    })?;
    Ok(Arc::new(store))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: &CancelToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping transfer");
            token.cancel();
        }
    });
}

fn write_output(output: Option<&Path>, document: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, document)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{document}");
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// skeind put
// -----------------------------------------------------------------------

async fn cmd_put(
    engine: &dyn SkeinEngine,
    client: &RefreshingClient,
    file: &Path,
    doc: &DocumentInfo,
    options: &ManifestOptions,
    retries: u32,
) -> Result<()> {
    let payload = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str::<serde_json::Value>(&payload)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let token = CancelToken::new();
    cancel_on_ctrl_c(&token);
    let report = |p: ChunkProgress| {
        let note = if p.resumed { " (resumed)" } else { "" };
        eprintln!("chunk {}/{}{note}", p.current_chunk, p.total_chunks);
    };
    let hooks = TransferHooks {
        on_chunk: Some(&report),
        cancel: Some(&token),
        ..TransferHooks::default()
    };

    let stored = put_with_retries(engine, client, &payload, doc, options, hooks, retries)
        .await
        .context("upload failed")?;

    info!(
        manifest_id = %stored.manifest_id,
        chunk_set_id = %stored.chunk_set_id,
        total_chunks = stored.total_chunks,
        uploaded = stored.uploaded,
        resumed = stored.resumed,
        "upload complete"
    );
    println!("{}", stored.manifest_id);
    Ok(())
}

/// Upload, retrying transient failures from the saved checkpoint.
///
/// A failed client rebuild is logged and the retry goes ahead on the previous
/// client; only upload errors are ever returned.
async fn put_with_retries(
    engine: &dyn SkeinEngine,
    client: &RefreshingClient,
    payload: &str,
    doc: &DocumentInfo,
    options: &ManifestOptions,
    hooks: TransferHooks<'_>,
    retries: u32,
) -> Result<StoredDocument, EngineError> {
    let mut attempt = 0;
    loop {
        match client.refresh_if_stale() {
            Ok(true) => info!("storage client was stale, rebuilt"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to rebuild stale storage client, keeping it"),
        }
        match engine.put_document(payload, doc, options, hooks).await {
            Ok(stored) => return Ok(stored),
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                warn!(attempt, retries, error = %e, "upload failed, retrying from checkpoint");
                if let Err(refresh_err) = client.refresh() {
                    warn!(
                        error = %refresh_err,
                        "failed to rebuild storage client, retrying with the previous one"
                    );
                }
            }
            Err(e) => return Err(e),
        }
    }
}

// -----------------------------------------------------------------------
// skeind get / head / fetch
// -----------------------------------------------------------------------

fn fetch_reporter(p: FetchProgress) {
    eprintln!("chunk {}/{} (batch {})", p.current_chunk, p.total_chunks, p.batch + 1);
}

async fn cmd_get(
    engine: &dyn SkeinEngine,
    manifest_id: &BlobId,
    output: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let token = CancelToken::new();
    cancel_on_ctrl_c(&token);
    let hooks = TransferHooks {
        on_fetch: Some(&fetch_reporter),
        cancel: Some(&token),
        ..TransferHooks::default()
    };

    let (document, manifest) = engine
        .get_document(manifest_id, hooks)
        .await
        .with_context(|| format!("failed to download {manifest_id}"))?;
    info!(
        %manifest_id,
        project_id = %manifest.project_id,
        total_chunks = manifest.total_chunks,
        "download complete"
    );

    if pretty {
        let value: serde_json::Value = serde_json::from_str(&document)?;
        write_output(output, &serde_json::to_string_pretty(&value)?)
    } else {
        write_output(output, &document)
    }
}

async fn cmd_head(engine: &dyn SkeinEngine, manifest_id: &BlobId) -> Result<()> {
    let manifest = engine
        .head_document(manifest_id)
        .await
        .with_context(|| format!("failed to read manifest {manifest_id}"))?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

async fn cmd_fetch(
    engine: &dyn SkeinEngine,
    chunk_set_id: &ChunkSetId,
    total_chunks: u32,
    output: Option<&Path>,
) -> Result<()> {
    let token = CancelToken::new();
    cancel_on_ctrl_c(&token);
    let hooks = TransferHooks {
        on_fetch: Some(&fetch_reporter),
        cancel: Some(&token),
        ..TransferHooks::default()
    };

    let document = engine
        .fetch_chunk_set(chunk_set_id, total_chunks, hooks)
        .await
        .with_context(|| format!("failed to reassemble chunk set {chunk_set_id}"))?;
    write_output(output, &document)
}

// -----------------------------------------------------------------------
// skeind pending
// -----------------------------------------------------------------------

fn cmd_pending(progress: &dyn ProgressStore) -> Result<()> {
    let pending = progress.list()?;
    println!("Pending uploads: {}", pending.len());
    for record in &pending {
        println!(
            "  {} set={} {}/{} chunks started_at={}",
            record.project_id,
            record.chunk_set_id,
            record.completed(),
            record.total_chunks,
            record.started_at,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use bytes::Bytes;
    use skein_store::BlobRecord;
    use skein_types::{Tag, TransferConfig};

    use super::*;

    /// Memory store whose first put fails as if the backend dropped.
    struct FlakyStore {
        inner: MemoryBlobStore,
        failed: AtomicBool,
    }

    #[async_trait::async_trait]
    impl BlobStore for FlakyStore {
        async fn put(&self, data: Bytes, tags: Vec<Tag>) -> Result<BlobId, StoreError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.put(data, tags).await
        }

        async fn get(&self, id: &BlobId) -> Result<Option<Bytes>, StoreError> {
            self.inner.get(id).await
        }

        async fn search(&self, filter: &[Tag]) -> Result<Vec<BlobRecord>, StoreError> {
            self.inner.search(filter).await
        }
    }

    /// A client whose factory works once, then always fails.
    fn one_shot_client(builds: Arc<AtomicUsize>) -> RefreshingClient {
        let store: Arc<dyn BlobStore> = Arc::new(FlakyStore {
            inner: MemoryBlobStore::new(),
            failed: AtomicBool::new(false),
        });
        let factory: StoreFactory = Box::new(move || {
            if builds.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(store.clone())
            } else {
                Err(StoreError::Unavailable("gateway down".into()))
            }
        });
        RefreshingClient::new(factory, Duration::from_secs(3600)).unwrap()
    }

    fn test_node(client: Arc<RefreshingClient>) -> SkeinNode {
        let config = TransferConfig {
            chunk_size: 100,
            batch_pause: Duration::ZERO,
            ..TransferConfig::default()
        };
        SkeinNode::new(config, client, Arc::new(MemoryProgressStore::default()))
    }

    #[tokio::test]
    async fn test_retry_survives_failed_client_rebuild() {
        let builds = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(one_shot_client(builds.clone()));
        let node = test_node(client.clone());
        let payload = r#"{"scene":"tower","floors":12}"#;
        let doc = DocumentInfo::new("p1", "Tower", "ada");

        let stored = put_with_retries(
            &node,
            &client,
            payload,
            &doc,
            &ManifestOptions::default(),
            TransferHooks::default(),
            2,
        )
        .await
        .unwrap();

        // The rebuild after the failed put was attempted and failed.
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        let (document, _) = node
            .get_document(&stored.manifest_id, TransferHooks::default())
            .await
            .unwrap();
        assert_eq!(document, payload);
    }

    #[tokio::test]
    async fn test_upload_error_returned_when_retries_exhausted() {
        let builds = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(one_shot_client(builds.clone()));
        let node = test_node(client.clone());

        let err = put_with_retries(
            &node,
            &client,
            r#"{"a":1}"#,
            &DocumentInfo::new("p1", "Tower", "ada"),
            &ManifestOptions::default(),
            TransferHooks::default(),
            0,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Store(StoreError::Unavailable(ref msg)) if msg == "connection reset"
        ));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
