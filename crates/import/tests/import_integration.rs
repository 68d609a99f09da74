//! End-to-end importer runs against in-memory stores

mod common;

use common::{document, record_at, value_in, Fixture, DICTIONARY};
use phrasebook_core::{
    derive_id, ContentStore, DomainLookup, ItemId, Language, MemoryStore, Record, Template,
};
use phrasebook_import::{ImportError, Toggle};
use phrasebook_journal::{JobState, JobView};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const HELLO: &str =
    r#"<sitecore><phrase key="Hello"><en>Hello</en><fr>Bonjour</fr></phrase></sitecore>"#;

#[test]
fn test_hello_creates_bucket_and_entry() {
    let fx = Fixture::new();
    let (status, result) = fx.import(HELLO, &["en", "fr"]);

    let summary = result.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(status.state(), JobState::Finished);
    assert_eq!(status.total(), 1);
    assert_eq!(status.processed(), 1);
    assert!(status.messages().is_empty());

    let snapshot = fx.core.snapshot();
    assert_eq!(
        snapshot.children_of(DICTIONARY),
        vec!["/sitecore/system/Dictionary/H"]
    );
    assert_eq!(
        snapshot.children_of("/sitecore/system/Dictionary/H"),
        vec!["/sitecore/system/Dictionary/H/Hello"]
    );

    let entry = snapshot.get("/sitecore/system/Dictionary/H/Hello").unwrap();
    assert_eq!(entry.id, derive_id("/sitecore/system/Dictionary/H", "Hello"));
    assert_eq!(entry.shared.get("Key").map(String::as_str), Some("Hello"));
    assert_eq!(entry.value_in("en", "Phrase"), "Hello");
    assert_eq!(entry.value_in("fr", "Phrase"), "Bonjour");
}

#[test]
fn test_reimport_is_idempotent() {
    let fx = Fixture::new();
    let xml = document(&[
        r#"<phrase key="Hello"><en>Hello</en><fr>Bonjour</fr></phrase>"#,
        r#"<phrase key="hello"><en>hi</en></phrase>"#,
        r#"<phrase key="Goodbye"><en>Goodbye</en><fr>Au revoir</fr></phrase>"#,
        r#"<phrase><en>Thanks</en></phrase>"#,
    ]);

    let (_, first) = fx.import(&xml, &["en", "fr"]);
    first.unwrap();
    let after_first = fx.core.snapshot();

    let (status, second) = fx.import(&xml, &["en", "fr"]);
    assert_eq!(second.unwrap().processed, 4);
    assert_eq!(status.processed(), 4);
    assert_eq!(fx.core.snapshot(), after_first);
}

#[test]
fn test_same_name_different_keys_get_distinct_entries() {
    let fx = Fixture::new();
    let xml = document(&[
        r#"<phrase key="Hello"><en>Hello</en></phrase>"#,
        r#"<phrase key="hello"><en>hello, lower</en></phrase>"#,
        r#"<phrase key="Hello!"><en>Hello, loud</en></phrase>"#,
    ]);
    let (status, result) = fx.import(&xml, &["en"]);
    result.unwrap();
    assert!(status.messages().is_empty());

    let store = fx.core.as_ref();
    let plain = record_at(store, "/sitecore/system/Dictionary/H/Hello");
    let lower = record_at(store, "/sitecore/system/Dictionary/H/Hello_1");
    let loud = record_at(store, "/sitecore/system/Dictionary/H/Hello_2");

    assert_eq!(plain.value("Key"), "Hello");
    assert_eq!(lower.value("Key"), "hello");
    assert_eq!(loud.value("Key"), "Hello!");
    assert_eq!(value_in(store, &lower.id, "en", "Phrase"), "hello, lower");
    assert_eq!(value_in(store, &loud.id, "en", "Phrase"), "Hello, loud");
}

#[test]
fn test_phrase_without_key_is_isolated() {
    let fx = Fixture::new();
    let xml = document(&[
        r#"<phrase key=""><fr>Sans clé</fr></phrase>"#,
        r#"<phrase key="World"><en>World</en></phrase>"#,
    ]);
    let (status, result) = fx.import(&xml, &["en", "fr"]);

    assert_eq!(result.unwrap().skipped, 1);
    assert_eq!(status.state(), JobState::Finished);
    assert_eq!(status.processed(), 2);

    let messages = status.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Missing key in \"<phrase key=\"\">"));

    let snapshot = fx.core.snapshot();
    assert_eq!(
        snapshot.children_of(DICTIONARY),
        vec!["/sitecore/system/Dictionary/W"]
    );
}

#[test]
fn test_invalid_name_is_logged_with_reason() {
    let fx = Fixture::new();
    let xml = document(&[r#"<phrase key="?!?"><en>x</en></phrase>"#]);
    let (status, result) = fx.import(&xml, &["en"]);

    result.unwrap();
    let messages = status.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("An item name cannot be blank. in \"<phrase"));
    assert!(fx.core.snapshot().children_of(DICTIONARY).is_empty());
}

#[test]
fn test_long_keys_never_exceed_max_name_length() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let fx = Fixture::new();
    let max = fx.config.max_name_length;

    let base: String = (0..max + 20)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect();
    let keys: Vec<String> = (0..12)
        .map(|i| format!("{}{}", base, i))
        .collect();
    let phrases: Vec<String> = keys
        .iter()
        .map(|key| format!(r#"<phrase key="{0}"><en>{0}</en></phrase>"#, key))
        .collect();
    let phrase_refs: Vec<&str> = phrases.iter().map(String::as_str).collect();

    let (status, result) = fx.import(&document(&phrase_refs), &["en"]);
    result.unwrap();
    assert!(status.messages().is_empty(), "{:?}", status.messages());

    let bucket = base[..1].to_uppercase();
    let bucket_path = format!("{}/{}", DICTIONARY, bucket);
    let snapshot = fx.core.snapshot();
    let entries = snapshot.children_of(&bucket_path);
    assert_eq!(entries.len(), keys.len());

    for path in entries {
        let name = path.rsplit('/').next().unwrap();
        assert!(name.chars().count() <= max, "{} is too long", name);
    }
    let stored: Vec<&str> = snapshot
        .items
        .values()
        .filter_map(|item| item.shared.get("Key").map(String::as_str))
        .collect();
    for key in &keys {
        assert!(stored.contains(&key.as_str()));
    }
}

#[test]
fn test_only_requested_languages_are_written() {
    let fx = Fixture::new();
    let xml = document(&[
        r#"<phrase key="Thanks"><en>Thanks</en><fr>Merci</fr><de>Danke</de></phrase>"#,
    ]);
    let (status, result) = fx.import(&xml, &["en", "fr"]);
    result.unwrap();
    assert!(status.messages().is_empty());

    let entry = fx
        .core
        .snapshot()
        .get("/sitecore/system/Dictionary/T/Thanks")
        .cloned()
        .unwrap();
    assert_eq!(entry.value_in("en", "Phrase"), "Thanks");
    assert_eq!(entry.value_in("fr", "Phrase"), "Merci");
    assert_eq!(entry.value_in("de", "Phrase"), "");
}

#[test]
fn test_stray_text_inside_phrase_is_logged() {
    let fx = Fixture::new();
    let xml = document(&["<phrase key=\"Yes\">oops<en>Yes</en></phrase>"]);
    let (status, result) = fx.import(&xml, &["en"]);

    result.unwrap();
    assert_eq!(status.messages(), vec!["Invalid entry in file at oops"]);
    let entry = record_at(fx.core.as_ref(), "/sitecore/system/Dictionary/Y/Yes");
    assert_eq!(entry.value("Phrase"), "Yes");
}

#[test]
fn test_domains() {
    let fx = Fixture::new();
    let site = fx.core.ensure_path("/sitecore/content/Site/Dictionary").unwrap();
    fx.core.register_domain("Site", Some(site.id));
    fx.core.register_domain("Orphan", None);

    let xml = document(&[
        r#"<phrase key="Welcome" domain="Site"><en>Welcome</en></phrase>"#,
        r#"<phrase key="Welcome" domain="Nope"><en>Welcome</en></phrase>"#,
        r#"<phrase key="Welcome" domain="Orphan"><en>Welcome</en></phrase>"#,
    ]);
    let (status, result) = fx.import(&xml, &["en"]);
    result.unwrap();

    assert_eq!(
        status.messages(),
        vec![
            "Dictionary domain \"Nope\" not found.",
            "Dictionary item for domain \"Orphan\" not found.",
        ]
    );
    let entry = record_at(fx.core.as_ref(), "/sitecore/content/Site/Dictionary/W/Welcome");
    assert_eq!(entry.id, derive_id("/sitecore/content/Site/Dictionary/W", "Welcome"));
    assert!(fx.core.snapshot().children_of(DICTIONARY).is_empty());
}

#[test]
fn test_direct_phrases() {
    let fx = Fixture::new();
    let page = fx.page(&fx.core, "Home");
    let missing = derive_id("/nowhere", "gone");

    let xml = document(&[
        &format!(
            r#"<phrase key="Home title" itemid="{}" fieldid="Title"><en>Home</en><fr>Accueil</fr></phrase>"#,
            page.id
        ),
        &format!(
            r#"<phrase key="Gone" itemid="{}" fieldid="Title" path="/sitecore/content/Gone"><en>x</en></phrase>"#,
            missing
        ),
        &format!(
            r#"<phrase key="Redirected" itemid="{}" fieldid="Phrase" path="/sitecore/system/Dictionary/R/Redirected"><en>Redirected</en></phrase>"#,
            missing
        ),
        r#"<phrase key="By path" itemid="/sitecore/content/Home" fieldid="Code"><en>shared</en></phrase>"#,
    ]);
    let (status, result) = fx.import(&xml, &["en", "fr"]);
    result.unwrap();

    let store = fx.core.as_ref();
    assert_eq!(value_in(store, &page.id, "en", "Title"), "Home");
    assert_eq!(value_in(store, &page.id, "fr", "Title"), "Accueil");
    // Shared fields are not translated
    assert_eq!(value_in(store, &page.id, "en", "Code"), "");

    assert_eq!(status.messages(), vec![format!("Item \"{}\" not found.", missing)]);
    let redirected = record_at(store, "/sitecore/system/Dictionary/R/Redirected");
    assert_eq!(value_in(store, &redirected.id, "en", "Phrase"), "Redirected");
}

#[test]
fn test_database_override_and_fallback() {
    let fx = Fixture::new();
    let master_page = fx.page(&fx.master, "Home");

    let xml = document(&[
        &format!(
            r#"<phrase key="t" itemid="{}" fieldid="Title" database="MASTER"><en>From master</en></phrase>"#,
            master_page.id
        ),
        &format!(
            r#"<phrase key="t" itemid="{}" fieldid="Title" database="web"><en>Unreachable</en></phrase>"#,
            master_page.id
        ),
    ]);
    let (status, result) = fx.import(&xml, &["en"]);
    result.unwrap();

    assert_eq!(
        value_in(fx.master.as_ref(), &master_page.id, "en", "Title"),
        "From master"
    );
    // `web` is unknown, so the phrase fell back to `core`, which lacks the page
    assert_eq!(
        status.messages(),
        vec![format!("Item \"{}\" not found.", master_page.id)]
    );
    assert_eq!(status.processed(), 2);
}

#[test]
fn test_commit_failure_keeps_prior_value_and_continues() {
    let fx = Fixture::new();
    let page = fx.page(&fx.core, "Home");
    fx.core
        .put_value(&page.id, &Language::from("en"), "Title", "Original")
        .unwrap();
    fx.core.fail_commits_for(page.id);

    let xml = document(&[
        &format!(
            r#"<phrase key="t" itemid="{}" fieldid="Title"><en>Rejected</en></phrase>"#,
            page.id
        ),
        r#"<phrase key="After"><en>After</en></phrase>"#,
    ]);
    let (status, result) = fx.import(&xml, &["en"]);
    result.unwrap();

    assert_eq!(status.state(), JobState::Finished);
    assert_eq!(value_in(fx.core.as_ref(), &page.id, "en", "Title"), "Original");
    assert!(!fx.core.is_editing(&page.id));
    assert_eq!(status.messages().len(), 1);
    record_at(fx.core.as_ref(), "/sitecore/system/Dictionary/A/After");
}

#[test]
fn test_identity_creation_retries_then_falls_back() {
    let fx = Fixture::new();
    fx.core.fail_identity_creates(1);
    let (_, result) = fx.import(HELLO, &["en"]);
    result.unwrap();
    let bucket = record_at(fx.core.as_ref(), "/sitecore/system/Dictionary/H");
    assert_eq!(bucket.id, derive_id(DICTIONARY, "H"));

    let fx = Fixture::new();
    fx.core.fail_identity_creates(fx.config.identity_create_attempts as usize);
    let (status, result) = fx.import(HELLO, &["en"]);
    result.unwrap();
    assert!(status.messages().is_empty());

    let bucket = record_at(fx.core.as_ref(), "/sitecore/system/Dictionary/H");
    assert_ne!(bucket.id, derive_id(DICTIONARY, "H"));
    let entry = record_at(fx.core.as_ref(), "/sitecore/system/Dictionary/H/Hello");
    assert_eq!(entry.id, derive_id("/sitecore/system/Dictionary/H", "Hello"));
}

#[test]
fn test_unparseable_file_fails_the_job() {
    let mut fx = Fixture::new();
    fx.config.disable_workflow = true;
    fx.config.disable_events = true;

    let (status, result) = fx.import("<sitecore><phrase key=\"a\"><en>a</fr></phrase>", &["en"]);

    assert!(matches!(result, Err(ImportError::Xml(_))));
    assert_eq!(status.state(), JobState::Failed);
    assert_eq!(status.processed(), 0);
    assert!(status.messages()[0].starts_with("Invalid language file"));
    assert!(fx.core.snapshot().children_of(DICTIONARY).is_empty());

    for toggle in [Toggle::Workflow, Toggle::Events, Toggle::DictionaryBatch] {
        assert!(!fx.toggles.is_active(toggle));
    }
    assert_eq!(fx.toggles.text_cache_generation(), 1);
}

/// Core store whose domain lookups hit a dead backend
struct DomainOutage(Arc<MemoryStore>);

impl ContentStore for DomainOutage {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn default_language(&self) -> Language {
        self.0.default_language()
    }

    fn get_in(&self, id: &ItemId, language: &Language) -> anyhow::Result<Option<Record>> {
        self.0.get_in(id, language)
    }

    fn get_by_path(&self, path: &str) -> anyhow::Result<Option<Record>> {
        self.0.get_by_path(path)
    }

    fn children(&self, parent: &ItemId) -> anyhow::Result<Vec<Record>> {
        self.0.children(parent)
    }

    fn template(&self, name: &str) -> anyhow::Result<Option<Template>> {
        self.0.template(name)
    }

    fn create(
        &self,
        parent: &ItemId,
        name: &str,
        template: &Template,
        id: Option<ItemId>,
    ) -> anyhow::Result<Record> {
        self.0.create(parent, name, template, id)
    }

    fn resolve_domain(&self, _domain: &str) -> anyhow::Result<DomainLookup> {
        anyhow::bail!("backend down")
    }

    fn begin_edit(&self, id: &ItemId, language: &Language) -> anyhow::Result<()> {
        self.0.begin_edit(id, language)
    }

    fn set_field(&self, id: &ItemId, language: &Language, field: &str, value: &str) -> anyhow::Result<()> {
        self.0.set_field(id, language, field, value)
    }

    fn end_edit(&self, id: &ItemId, language: &Language) -> anyhow::Result<()> {
        self.0.end_edit(id, language)
    }

    fn cancel_edit(&self, id: &ItemId, language: &Language) {
        self.0.cancel_edit(id, language)
    }
}

#[test]
fn test_store_failure_mid_batch_aborts_the_run() {
    let mut fx = Fixture::new();
    fx.config.disable_workflow = true;
    fx.config.disable_events = true;
    fx.registry.register(Arc::new(DomainOutage(fx.core.clone())));

    let (status, result) = fx.import(
        &document(&[
            r#"<phrase key="Apple"><en>Apple</en></phrase>"#,
            r#"<phrase key="Banana" domain="Shop"><en>Banana</en></phrase>"#,
            r#"<phrase key="Cherry"><en>Cherry</en></phrase>"#,
        ]),
        &["en"],
    );

    assert!(matches!(result, Err(ImportError::Store(_))));
    assert_eq!(status.state(), JobState::Failed);
    assert_eq!((status.processed(), status.total()), (1, 3));
    let messages = status.messages();
    let last = messages.last().unwrap();
    assert!(last.contains("Banana"));
    assert!(last.contains("backend down"));

    // Nothing after the failing phrase reaches the store
    let snapshot = fx.core.snapshot();
    assert_eq!(snapshot.children_of(DICTIONARY), vec!["/sitecore/system/Dictionary/A"]);
    assert!(fx.core.get_by_path("/sitecore/system/Dictionary/C").unwrap().is_none());

    for toggle in [Toggle::Workflow, Toggle::Events, Toggle::DictionaryBatch] {
        assert!(!fx.toggles.is_active(toggle));
    }
    assert_eq!(fx.toggles.text_cache_generation(), 1);
}

#[test]
fn test_document_without_phrases_finishes() {
    let fx = Fixture::new();
    let (status, result) = fx.import("<sitecore>\n  <!-- nothing -->\n</sitecore>", &["en"]);

    assert_eq!(result.unwrap().total, 0);
    assert_eq!(status.state(), JobState::Finished);
    assert_eq!(status.total(), 0);
    assert_eq!(status.snapshot().view(), JobView::Done { messages: Vec::new() });
}

#[test]
fn test_unknown_database_and_missing_dictionary_fail() {
    let fx = Fixture::new();
    let (status, result) = fx.import_into("web", HELLO, &["en"]);
    assert!(matches!(result, Err(ImportError::UnknownDatabase(_))));
    assert_eq!(status.messages(), vec!["Database \"web\" not found"]);

    let bare = Arc::new(MemoryStore::new("bare"));
    fx.registry.register(bare);
    let (status, result) = fx.import_into("bare", HELLO, &["en"]);
    assert!(matches!(result, Err(ImportError::MissingDictionaryRoot(_))));
    assert_eq!(status.state(), JobState::Failed);
}

#[test]
fn test_missing_entry_template_fails() {
    let fx = Fixture::new();
    let store = Arc::new(MemoryStore::new("plain"));
    store.register_template(Template::dictionary_folder());
    store.ensure_path(DICTIONARY).unwrap();
    fx.registry.register(store.clone());

    let (status, result) = fx.import_into("plain", HELLO, &["en"]);
    assert!(matches!(result, Err(ImportError::MissingTemplate(_))));
    assert_eq!(status.state(), JobState::Failed);
    assert!(store.children(&record_at(store.as_ref(), DICTIONARY).id).unwrap().is_empty());
}

#[test]
fn test_toggles_are_held_only_during_the_run() {
    let mut fx = Fixture::new();
    fx.config.disable_workflow = true;
    let (_, result) = fx.import(HELLO, &["en"]);
    result.unwrap();

    assert!(!fx.toggles.is_active(Toggle::Workflow));
    assert!(!fx.toggles.is_active(Toggle::DictionaryBatch));
    assert_eq!(fx.toggles.text_cache_generation(), 1);
}
