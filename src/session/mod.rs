// Session module
// Tracks which manual is loaded, persists that across runs, memoizes the
// expensive handles (vector store, Ollama client), and owns the cleanup
// path when a manual is discarded.


use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::answer::SourceChunk;
use crate::config::Config;
use crate::embeddings::OllamaClient;
use crate::index::VectorStore;
use crate::pipeline::IndexOutcome;
use crate::Result;

/// The manual currently loaded, as persisted in `session.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualRecord {
    pub filename: String,
    pub pdf_path: PathBuf,
    pub document_id: String,
    pub collection: String,
    pub index_dir: PathBuf,
    /// The model the index was embedded with. Questions must be embedded
    /// with the same model regardless of the configured default.
    pub embedding_model: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub uploaded_at: String,
}

impl ManualRecord {
    #[inline]
    pub fn from_outcome(outcome: &IndexOutcome, filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            pdf_path: outcome.pdf_path.clone(),
            document_id: outcome.document_id.clone(),
            collection: outcome.collection.clone(),
            index_dir: outcome.index_dir.clone(),
            embedding_model: outcome.embedding_model.clone(),
            page_count: outcome.page_count,
            chunk_count: outcome.chunk_count,
            uploaded_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One question/answer exchange in the current chat.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

/// Holds the loaded manual plus memoized backend handles.
///
/// Handles are keyed by the settings they were built from and rebuilt when
/// those change, never implicitly reused across manuals.
pub struct SessionContext {
    config: Config,
    manual: Option<ManualRecord>,
    turns: Vec<ConversationTurn>,
    store: Option<(String, VectorStore)>,
    client: Option<(String, OllamaClient)>,
}

impl SessionContext {
    /// Load the session for a config, picking up a persisted manual record
    /// if one exists and its index is still on disk.
    #[inline]
    pub fn load(config: Config) -> Result<Self> {
        let session_path = config.session_file_path();
        let manual = if session_path.exists() {
            let content = fs::read_to_string(&session_path).with_context(|| {
                format!("Failed to read session file: {}", session_path.display())
            })?;
            match toml::from_str::<ManualRecord>(&content) {
                Ok(record) if record.index_dir.exists() => Some(record),
                Ok(record) => {
                    warn!(
                        "Session points at missing index {:?}, ignoring it",
                        record.index_dir
                    );
                    None
                }
                Err(e) => {
                    warn!("Ignoring unreadable session file: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config,
            manual,
            turns: Vec::new(),
            store: None,
            client: None,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn manual(&self) -> Option<&ManualRecord> {
        self.manual.as_ref()
    }

    /// Record a freshly indexed manual as the active one and persist it.
    /// Any previous manual's artifacts are removed first.
    #[inline]
    pub fn set_manual(&mut self, record: ManualRecord) -> Result<()> {
        if let Some(previous) = self.manual.take() {
            if previous.document_id != record.document_id {
                Self::remove_artifacts(&previous);
            } else if previous.pdf_path != record.pdf_path {
                // Same document, fresh timestamped upload. The index is
                // reused but the old copy of the file must not linger.
                Self::remove_upload(&previous.pdf_path);
            }
        }

        let session_path = self.config.session_file_path();
        if let Some(parent) = session_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(&record).context("Failed to serialize session record")?;
        fs::write(&session_path, content).with_context(|| {
            format!("Failed to write session file: {}", session_path.display())
        })?;

        info!(
            "Active manual is now {} ({})",
            record.filename, record.document_id
        );
        self.manual = Some(record);
        self.turns.clear();
        self.store = None;
        self.client = None;
        Ok(())
    }

    /// Memoized vector store for the active manual.
    #[inline]
    pub async fn vector_store(&mut self) -> Result<&VectorStore> {
        let manual = self.manual.as_ref().ok_or_else(|| {
            crate::ManualQaError::Storage("No manual is loaded".to_string())
        })?;

        let key = format!("{}|{}", manual.index_dir.display(), manual.collection);
        let stale = self.store.as_ref().is_none_or(|(k, _)| *k != key);
        if stale {
            let store = VectorStore::open(&manual.index_dir, &manual.document_id).await?;
            self.store = Some((key, store));
        }

        self.store.as_ref().map(|(_, s)| s).ok_or_else(|| {
            crate::ManualQaError::Index("Vector store handle missing".to_string())
        })
    }

    /// Memoized Ollama client, pinned to the active manual's embedding model.
    #[inline]
    pub fn ollama_client(&mut self) -> Result<&OllamaClient> {
        let embedding_model = self
            .manual
            .as_ref()
            .map(|m| m.embedding_model.clone())
            .unwrap_or_else(|| self.config.ollama.embedding_model.clone());

        let key = client_key(&self.config, &embedding_model);
        let stale = self.client.as_ref().is_none_or(|(k, _)| *k != key);
        if stale {
            let client =
                OllamaClient::new(&self.config)?.with_embedding_model(embedding_model);
            self.client = Some((key, client));
        }

        self.client.as_ref().map(|(_, c)| c).ok_or_else(|| {
            crate::ManualQaError::Model("Ollama client handle missing".to_string())
        })
    }

    /// Fresh client built straight from the configured settings.
    ///
    /// Indexing a new document must use the configured embedding model, not
    /// the one pinned to whatever manual happens to be active.
    #[inline]
    pub fn indexing_client(&self) -> Result<OllamaClient> {
        Ok(OllamaClient::new(&self.config)?)
    }

    #[inline]
    pub fn record_turn(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    #[inline]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Discard the active manual: its upload, its index, the session file,
    /// the chat history and all memoized handles.
    ///
    /// Artifact removal is best-effort; a file already gone is not an error.
    #[inline]
    pub fn discard_manual(&mut self) -> Result<Option<ManualRecord>> {
        let discarded = self.manual.take();

        if let Some(record) = &discarded {
            Self::remove_artifacts(record);
        }

        let session_path = self.config.session_file_path();
        if session_path.exists() {
            if let Err(e) = fs::remove_file(&session_path) {
                warn!("Failed to remove session file: {}", e);
            }
        }

        self.turns.clear();
        self.store = None;
        self.client = None;

        Ok(discarded)
    }

    fn remove_artifacts(record: &ManualRecord) {
        Self::remove_upload(&record.pdf_path);
        if record.index_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&record.index_dir) {
                warn!("Failed to remove index {:?}: {}", record.index_dir, e);
            }
        }
        info!("Removed artifacts for {}", record.document_id);
    }

    fn remove_upload(path: &Path) {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to remove upload {:?}: {}", path, e);
            }
        }
    }
}

/// Memoization key for the Ollama client handle. Every setting the client is
/// built from participates, including the protocol.
fn client_key(config: &Config, embedding_model: &str) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        config.ollama.protocol,
        config.ollama.host,
        config.ollama.port,
        embedding_model,
        config.ollama.language_model
    )
}
