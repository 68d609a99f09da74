//! Import driver
//!
//! Runs one language file against one database:
//!
//! ```text
//! Idle -> Running -> Finished
//!                 -> Failed
//! ```
//!
//! Batch switches are held for the whole run and released on every exit
//! path. Phrases are processed in document order; a phrase-level problem is
//! logged and the run continues, a store failure aborts the run.

use crate::config::ImportConfig;
use crate::context::{PhraseOutcome, RunContext};
use crate::create::RecordFactory;
use crate::direct::update_direct;
use crate::document::PhraseDocument;
use crate::error::{ImportError, Result};
use crate::reconcile::{reconcile, DictionaryTarget};
use crate::section::SectionCache;
use crate::suppress::{NoSideEffects, SideEffects, SuppressionGuard, Toggle};
use anyhow::Context;
use phrasebook_core::{
    Blake3Identity, ContentStore, IdentityScheme, NamingPolicy, StandardNamingPolicy, StoreProvider,
};
use phrasebook_journal::{JobHandle, JobManager, RetentionPolicy, StatusSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Job name used for background imports
pub const JOB_NAME: &str = "ImportLanguage";

/// What to import, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    database: String,
    file: PathBuf,
    languages: Vec<String>,
}

impl ImportRequest {
    /// Validated request
    pub fn new(
        database: impl Into<String>,
        file: impl Into<PathBuf>,
        languages: Vec<String>,
    ) -> Result<Self> {
        let database = database.into();
        let file = file.into();

        if database.trim().is_empty() {
            return Err(ImportError::InvalidRequest("database name is empty".to_string()));
        }
        if file.as_os_str().is_empty() {
            return Err(ImportError::InvalidRequest("file name is empty".to_string()));
        }
        if languages.is_empty() {
            return Err(ImportError::InvalidRequest("no languages to import".to_string()));
        }

        Ok(Self {
            database,
            file,
            languages,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }
}

/// Counters for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Imports language files into content stores
pub struct Importer {
    config: ImportConfig,
    stores: Arc<dyn StoreProvider>,
    effects: Arc<dyn SideEffects>,
    naming: Arc<dyn NamingPolicy>,
    identity: Arc<dyn IdentityScheme>,
}

impl Importer {
    /// Importer with standard naming rules, BLAKE3 identities and no host switches
    ///
    /// Fails when `config` is out of range.
    pub fn new(config: ImportConfig, stores: Arc<dyn StoreProvider>) -> Result<Self> {
        config.validate()?;
        let naming = Arc::new(StandardNamingPolicy::new(config.max_name_length));
        Ok(Self {
            config,
            stores,
            effects: Arc::new(NoSideEffects),
            naming,
            identity: Arc::new(Blake3Identity),
        })
    }

    /// Use host switches
    pub fn with_side_effects(mut self, effects: Arc<dyn SideEffects>) -> Self {
        self.effects = effects;
        self
    }

    /// Use different naming rules
    ///
    /// The policy's maximum length replaces `max_name_length` for entry names.
    pub fn with_naming(mut self, naming: Arc<dyn NamingPolicy>) -> Self {
        self.naming = naming;
        self
    }

    /// Use a different identity scheme
    pub fn with_identity(mut self, identity: Arc<dyn IdentityScheme>) -> Self {
        self.identity = identity;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Run an import to completion on the calling thread
    ///
    /// The outcome is recorded on `status`; the returned error is the one
    /// already logged there.
    pub fn run(&self, request: &ImportRequest, status: &dyn StatusSink) -> Result<RunSummary> {
        status.mark_running();
        info!(
            database = request.database(),
            file = %request.file().display(),
            languages = ?request.languages(),
            "Starting language import"
        );

        let outcome = self.run_suppressed(request, status);
        self.effects.reset_text_cache();

        match outcome {
            Ok(summary) => {
                info!(
                    target: "audit",
                    "Import language: {}, from: {}",
                    request.languages().join(", "),
                    request.file().display()
                );
                info!(
                    processed = summary.processed,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "Language import finished"
                );
                status.mark_finished();
                Ok(summary)
            }
            Err(e) => {
                error!("Language import failed: {}", e);
                status.log_exception(&e);
                status.mark_failed();
                Err(e)
            }
        }
    }

    /// Run an import as a background job
    pub fn start(self: Arc<Self>, jobs: &JobManager, request: ImportRequest) -> anyhow::Result<JobHandle> {
        let retention = RetentionPolicy::new(self.config.job_after_life());
        jobs.start_with_retention(JOB_NAME, retention, move |status| {
            // Failures are already on the status
            let _ = self.run(&request, status);
        })
    }

    fn run_suppressed(&self, request: &ImportRequest, status: &dyn StatusSink) -> Result<RunSummary> {
        // Released in reverse order when this frame unwinds or returns
        let _workflow = self.suppress(self.config.disable_workflow, Toggle::Workflow)?;
        let _events = self.suppress(self.config.disable_events, Toggle::Events)?;
        let _batch = self.suppress(true, Toggle::DictionaryBatch)?;

        self.import(request, status)
    }

    fn suppress(&self, enabled: bool, toggle: Toggle) -> Result<Option<SuppressionGuard<'_>>> {
        if !enabled {
            return Ok(None);
        }
        SuppressionGuard::enter(self.effects.as_ref(), toggle)
            .map(Some)
            .map_err(|cause| ImportError::Suppression { toggle, cause })
    }

    fn import(&self, request: &ImportRequest, status: &dyn StatusSink) -> Result<RunSummary> {
        let store = self
            .stores
            .store(request.database())
            .ok_or_else(|| ImportError::UnknownDatabase(request.database().to_string()))?;

        let root = store
            .get_by_path(&self.config.dictionary_root)?
            .ok_or_else(|| ImportError::MissingDictionaryRoot(self.config.dictionary_root.clone()))?;
        let folder_template = store
            .template(&self.config.folder_template)?
            .ok_or_else(|| ImportError::MissingTemplate(self.config.folder_template.clone()))?;
        let entry_template = store
            .template(&self.config.entry_template)?
            .ok_or_else(|| ImportError::MissingTemplate(self.config.entry_template.clone()))?;

        let document = PhraseDocument::load(request.file())?;
        let mut summary = RunSummary {
            total: document.len(),
            ..RunSummary::default()
        };
        if document.is_empty() {
            info!(file = %request.file().display(), "No phrases to import");
            return Ok(summary);
        }
        status.set_total(document.len() as u64);

        let ctx = RunContext {
            config: &self.config,
            naming: self.naming.as_ref(),
            languages: request.languages(),
            status,
        };
        let dictionary = DictionaryTarget {
            factory: RecordFactory::new(
                store.as_ref(),
                self.identity.as_ref(),
                self.config.identity_create_attempts,
            ),
            root,
            folder_template,
            entry_template,
        };
        let mut cache = SectionCache::new();

        for phrase in document.phrases() {
            let handled = if phrase.is_direct() {
                let target = self.phrase_store(&store, &phrase.attributes.database);
                update_direct(&ctx, target.as_ref(), &dictionary, &mut cache, phrase)
            } else {
                reconcile(&ctx, &dictionary, &mut cache, phrase)
            };
            let outcome =
                handled.with_context(|| format!("Failed to import \"{}\"", phrase.outer_xml()))?;

            match outcome {
                PhraseOutcome::Updated { record, written } => {
                    debug!(%record, written, "Imported phrase");
                    summary.updated += 1;
                }
                PhraseOutcome::Skipped(skip) => {
                    status.log_error(&skip.to_string());
                    summary.skipped += 1;
                }
            }

            status.increment_processed();
            summary.processed += 1;
        }

        debug!(buckets = cache.bucket_count(), "Section cache at end of run");
        Ok(summary)
    }

    /// Store named by a phrase's `database` attribute, else the run's store
    fn phrase_store(&self, default: &Arc<dyn ContentStore>, name: &str) -> Arc<dyn ContentStore> {
        if name.is_empty() || name.eq_ignore_ascii_case(default.name()) {
            return Arc::clone(default);
        }
        match self.stores.store(name) {
            Some(store) => store,
            None => {
                warn!(database = name, fallback = default.name(), "Database override not found");
                Arc::clone(default)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let langs = vec!["en".to_string()];
        assert!(ImportRequest::new("core", "phrases.xml", langs.clone()).is_ok());
        assert!(matches!(
            ImportRequest::new("", "phrases.xml", langs.clone()),
            Err(ImportError::InvalidRequest(_))
        ));
        assert!(matches!(
            ImportRequest::new("core", "", langs),
            Err(ImportError::InvalidRequest(_))
        ));
        assert!(matches!(
            ImportRequest::new("core", "phrases.xml", Vec::new()),
            Err(ImportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_out_of_range_config_is_rejected() {
        let stores = Arc::new(phrasebook_core::StoreRegistry::new());
        assert!(Importer::new(ImportConfig::default(), stores.clone()).is_ok());

        let config = ImportConfig {
            max_name_length: 1,
            ..ImportConfig::default()
        };
        assert!(matches!(
            Importer::new(config, stores),
            Err(ImportError::Config(_))
        ));
    }
}
