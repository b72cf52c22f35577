//! Indexing pipeline: Markdown files → chunks → vectors → store points.
//!
//! Re-indexing is idempotent: a document's existing points are deleted by
//! `doc_id` before its new chunks are written, and point ids are derived from
//! chunk ids. Documents succeed or fail independently and the outcome is
//! collected in an [`IndexReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use embed_service::{EmbeddingProvider, ProviderContext};
use indicatif::{ProgressBar, ProgressStyle};
use md_chunker::{Chunk, ChunkOptions, Document};
use services::doc_id::stable_doc_id;
use tracing::{debug, error, info, trace, warn};

use crate::config::KbConfig;
use crate::discovery::{is_markdown, markdown_files};
use crate::embed_pool::encode_chunks;
use crate::errors::KbError;
use crate::filters::StoreFilter;
use crate::record::{EncodedChunk, IndexReport};
use crate::store::VectorStore;

pub struct IndexLifecycleManager {
    store: Arc<dyn VectorStore>,
    providers: Arc<ProviderContext>,
    cfg: Arc<KbConfig>,
}

impl IndexLifecycleManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        providers: Arc<ProviderContext>,
        cfg: Arc<KbConfig>,
    ) -> Self {
        Self {
            store,
            providers,
            cfg,
        }
    }

    /// Creates the collection (dense size from the embedder, sparse enabled)
    /// if it does not exist yet, and returns the embedder.
    pub async fn ensure_collection(&self) -> Result<Arc<dyn EmbeddingProvider>, KbError> {
        let embedder = self.providers.embedder().await?;
        self.store
            .create_collection(embedder.dim(), self.cfg.distance, true)
            .await?;
        Ok(embedder)
    }

    /// Indexes one Markdown file, replacing any previous version.
    ///
    /// Returns the number of chunks written.
    pub async fn index_file(&self, path: &Path) -> Result<usize, KbError> {
        trace!("ingest::index_file path={:?}", path);
        let doc = Document::load(path, &self.cfg.chunk)?;
        let doc_id = doc.doc_id.clone();
        let report = self.index_documents(vec![doc], false).await?;

        if let Some((doc_id, reason)) = report.failed.into_iter().next() {
            return Err(KbError::IndexFailed { doc_id, reason });
        }
        let n = report.indexed.get(&doc_id).copied().unwrap_or(0);
        info!(doc_id = %doc_id, chunks = n, "indexed {}", path.display());
        Ok(n)
    }

    /// Rebuilds every Markdown file under `dirs`.
    ///
    /// All files are parsed before anything is written; unparsable files are
    /// skipped and reported.
    pub async fn index_full(&self, dirs: &[PathBuf]) -> Result<IndexReport, KbError> {
        let started = Instant::now();
        let files = markdown_files(dirs);
        info!("Full rebuild: {} markdown files under {} dirs", files.len(), dirs.len());

        let mut skipped = BTreeMap::new();
        let mut docs = Vec::with_capacity(files.len());
        for path in &files {
            match Document::load(path, &self.cfg.chunk) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparsable document");
                    skipped.insert(path.display().to_string(), e.to_string());
                }
            }
        }

        let mut report = self.index_documents(docs, true).await?;
        report.skipped.extend(skipped);
        info!(
            docs = report.indexed.len(),
            chunks = report.chunks_indexed(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "full rebuild done"
        );
        Ok(report)
    }

    /// Re-indexes an externally supplied list of changed paths.
    ///
    /// Paths that no longer exist are removed by their derived doc id.
    /// Non-Markdown paths are ignored.
    pub async fn index_changed(&self, paths: &[PathBuf]) -> Result<IndexReport, KbError> {
        self.index_changed_with(paths, &self.cfg.chunk).await
    }

    /// Like [`Self::index_changed`], with doc paths taken relative to `root`
    /// (e.g. a git working tree) unless a root is configured.
    pub async fn index_changed_under(
        &self,
        root: &Path,
        paths: &[PathBuf],
    ) -> Result<IndexReport, KbError> {
        let mut opts = self.cfg.chunk.clone();
        opts.root.get_or_insert_with(|| root.to_path_buf());
        self.index_changed_with(paths, &opts).await
    }

    async fn index_changed_with(
        &self,
        paths: &[PathBuf],
        opts: &ChunkOptions,
    ) -> Result<IndexReport, KbError> {
        info!("Incremental rebuild: {} changed paths", paths.len());
        let mut report = IndexReport::default();

        for path in paths {
            if !is_markdown(path) {
                debug!(path = %path.display(), "not markdown, ignored");
                continue;
            }
            if !path.exists() {
                let doc_id = stable_doc_id(&opts.doc_path(path), &opts.strip_prefixes);
                self.delete_quietly(&doc_id).await;
                info!(doc_id = %doc_id, "removed deleted document {}", path.display());
                report.deleted.push(doc_id);
                continue;
            }
            match Document::load(path, opts) {
                Ok(doc) => {
                    let one = self.index_documents(vec![doc], false).await?;
                    report.indexed.extend(one.indexed);
                    report.failed.extend(one.failed);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparsable document");
                    report.skipped.insert(path.display().to_string(), e.to_string());
                }
            }
        }
        Ok(report)
    }

    /// Encodes and upserts pre-built chunks as they are (no prior delete).
    pub async fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<IndexReport, KbError> {
        trace!("ingest::index_chunks chunks={}", chunks.len());
        let embedder = self.ensure_collection().await?;
        let mut report = IndexReport::default();
        for c in &chunks {
            report.indexed.entry(c.doc_id.clone()).or_insert(0);
        }
        self.write_chunks(embedder.as_ref(), chunks, &mut report, None)
            .await;
        Ok(report)
    }

    /// Removes every chunk of `doc_id`.
    pub async fn delete_doc(&self, doc_id: &str) -> Result<(), KbError> {
        self.store.delete_by_filter(&StoreFilter::doc(doc_id)).await?;
        info!(doc_id = %doc_id, "document deleted");
        Ok(())
    }

    /// Removes every chunk whose `source_repo` equals `repo`.
    ///
    /// Counts first and skips the delete when nothing matches. Returns the
    /// number of chunks removed.
    pub async fn delete_by_source(&self, repo: &str) -> Result<u64, KbError> {
        let filter = StoreFilter::keyword("source_repo", repo);
        let n = self.store.count(Some(&filter)).await?;
        if n == 0 {
            info!(source_repo = %repo, "no chunks from this source");
            return Ok(0);
        }
        self.store.delete_by_filter(&filter).await?;
        info!(source_repo = %repo, chunks = n, "source deleted");
        Ok(n)
    }

    async fn delete_quietly(&self, doc_id: &str) {
        if let Err(e) = self.store.delete_by_filter(&StoreFilter::doc(doc_id)).await {
            warn!(doc_id = %doc_id, error = %e, "delete before re-index failed, continuing");
        }
    }

    /// Deletes the documents' old points, then writes their new chunks.
    async fn index_documents(
        &self,
        docs: Vec<Document>,
        progress: bool,
    ) -> Result<IndexReport, KbError> {
        let embedder = self.ensure_collection().await?;
        let mut report = IndexReport::default();

        let mut chunks = Vec::new();
        for doc in &docs {
            self.delete_quietly(&doc.doc_id).await;
            report.indexed.insert(doc.doc_id.clone(), 0);
            chunks.extend(doc.to_chunks(self.cfg.chunk.max_chars));
        }

        let bar = progress.then(|| progress_bar(chunks.len(), self.cfg.upsert_batch));
        self.write_chunks(embedder.as_ref(), chunks, &mut report, bar.as_ref())
            .await;
        if let Some(pb) = bar {
            pb.finish_with_message("Indexing complete ✔");
        }
        Ok(report)
    }

    /// Encodes and upserts `chunks` batch by batch, recording per-document
    /// outcomes. A document with any failed batch ends up in `failed` only.
    async fn write_chunks(
        &self,
        embedder: &dyn EmbeddingProvider,
        chunks: Vec<Chunk>,
        report: &mut IndexReport,
        progress: Option<&ProgressBar>,
    ) {
        let batch_cap = self.cfg.upsert_batch.max(1);
        let outcomes = encode_chunks(
            embedder,
            chunks,
            batch_cap,
            self.cfg.embedding.batch_size,
            self.cfg.embedding.concurrency,
        )
        .await;

        for outcome in outcomes {
            match outcome {
                Ok(encoded) => self.upsert_batch(encoded, batch_cap, report).await,
                Err(failed) => {
                    error!(error = %failed.error, docs = failed.doc_ids.len(), "batch not indexed");
                    for id in failed.doc_ids {
                        report.failed.insert(id, failed.error.to_string());
                    }
                }
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        for id in report.failed.keys() {
            report.indexed.remove(id);
        }
    }

    async fn upsert_batch(&self, batch: Vec<EncodedChunk>, batch_cap: usize, report: &mut IndexReport) {
        let mut per_doc: BTreeMap<String, usize> = BTreeMap::new();
        for c in &batch {
            *per_doc.entry(c.chunk.doc_id.clone()).or_default() += 1;
        }
        let points = batch.into_iter().map(EncodedChunk::into_point).collect();

        match self.store.upsert(points, batch_cap).await {
            Ok(n) => {
                debug!(points = n, docs = per_doc.len(), "batch upserted");
                for (id, k) in per_doc {
                    *report.indexed.entry(id).or_default() += k;
                }
            }
            Err(e) => {
                error!(error = %e, docs = per_doc.len(), "upsert failed");
                let ids: BTreeSet<String> = per_doc.into_keys().collect();
                for id in ids {
                    report.failed.insert(id, e.to_string());
                }
            }
        }
    }
}

fn progress_bar(chunks: usize, batch_cap: usize) -> ProgressBar {
    let total = chunks.div_ceil(batch_cap.max(1));
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map(|s| s.progress_chars("##-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
