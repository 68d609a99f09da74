//! Shared fixtures for importer integration tests

#![allow(dead_code)]

use phrasebook_core::{ContentStore, FieldDef, ItemId, MemoryStore, Record, StoreRegistry, Template};
use phrasebook_import::{ImportConfig, ImportRequest, Importer, ProcessToggles, RunSummary};
use phrasebook_journal::JobStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const DICTIONARY: &str = "/sitecore/system/Dictionary";
pub const PAGE_TEMPLATE: &str = "Sample/Page";

/// Route importer logs to the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Two databases (`core`, `master`) with dictionaries and a scratch directory
pub struct Fixture {
    pub registry: Arc<StoreRegistry>,
    pub core: Arc<MemoryStore>,
    pub master: Arc<MemoryStore>,
    pub toggles: Arc<ProcessToggles>,
    pub config: ImportConfig,
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();

        let core = Arc::new(dictionary_store("core"));
        let master = Arc::new(dictionary_store("master"));
        let registry = Arc::new(StoreRegistry::new());
        registry.register(core.clone());
        registry.register(master.clone());

        Self {
            registry,
            core,
            master,
            toggles: Arc::new(ProcessToggles::new()),
            config: ImportConfig::default(),
            dir: TempDir::new().expect("temp dir"),
        }
    }

    /// Write a language file into the scratch directory
    pub fn write(&self, name: &str, xml: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, xml).expect("write language file");
        path
    }

    pub fn importer(&self) -> Importer {
        Importer::new(self.config.clone(), self.registry.clone())
            .expect("valid config")
            .with_side_effects(self.toggles.clone())
    }

    /// Import `xml` into `database`; returns the job status and the run result
    pub fn import_into(
        &self,
        database: &str,
        xml: &str,
        languages: &[&str],
    ) -> (JobStatus, phrasebook_import::Result<RunSummary>) {
        let file = self.write("phrases.xml", xml);
        let request = ImportRequest::new(
            database,
            file,
            languages.iter().map(|l| l.to_string()).collect(),
        )
        .expect("valid request");

        let status = JobStatus::new("ImportLanguage");
        let result = self.importer().run(&request, &status);
        (status, result)
    }

    /// Import `xml` into `core`
    pub fn import(&self, xml: &str, languages: &[&str]) -> (JobStatus, phrasebook_import::Result<RunSummary>) {
        self.import_into("core", xml, languages)
    }

    /// Create `/sitecore/content/{name}` from the sample page template
    pub fn page(&self, store: &MemoryStore, name: &str) -> Record {
        let content = store.ensure_path("/sitecore/content").expect("content folder");
        store
            .create(&content.id, name, &page_template(), None)
            .expect("create page")
    }
}

pub fn dictionary_store(name: &str) -> MemoryStore {
    let store = MemoryStore::with_dictionary(name).with_languages(&["en", "fr", "de"]);
    store.register_template(page_template());
    store
}

pub fn page_template() -> Template {
    Template::new(
        PAGE_TEMPLATE,
        vec![FieldDef::translatable("Title"), FieldDef::shared("Code")],
    )
}

/// Record at `path`, panicking when missing
pub fn record_at(store: &dyn ContentStore, path: &str) -> Record {
    store
        .get_by_path(path)
        .expect("store lookup")
        .unwrap_or_else(|| panic!("no record at {}", path))
}

/// Value of `field` in one language variant
pub fn value_in(store: &dyn ContentStore, id: &ItemId, language: &str, field: &str) -> String {
    store
        .get_in(id, &language.into())
        .expect("store lookup")
        .map(|record| record.value(field).to_string())
        .unwrap_or_default()
}

/// `<sitecore>` document around the given phrases
pub fn document(phrases: &[&str]) -> String {
    format!("<sitecore>\n{}\n</sitecore>", phrases.join("\n"))
}
