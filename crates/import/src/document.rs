//! Phrase file parsing
//!
//! A phrase file looks like:
//!
//! ```xml
//! <sitecore>
//!   <phrase key="Hello" domain="" itemid="" fieldid="" database="" path="">
//!     <en>Hello</en>
//!     <fr>Bonjour</fr>
//!   </phrase>
//! </sitecore>
//! ```
//!
//! Only immediate `<phrase>` children of a `<sitecore>` root are read. A
//! phrase without element children is not a phrase and is dropped. Text,
//! comments and CDATA directly inside a phrase are kept as invalid children
//! so the importer can report them.

use crate::error::{ImportError, Result};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::path::Path;

const ROOT_ELEMENT: &[u8] = b"sitecore";
const PHRASE_ELEMENT: &[u8] = b"phrase";

/// Attributes of a `<phrase>` element; absent attributes are empty
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseAttributes {
    pub key: String,
    pub domain: String,
    pub item_id: String,
    pub field_id: String,
    pub database: String,
    pub path: String,
}

/// Child node of a phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseChild {
    /// `<fr>Bonjour</fr>`: element name is the language, text content is the value
    Language { name: String, text: String },
    /// Anything that is not an element, as written in the file
    Invalid { xml: String },
}

/// One `<phrase>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    pub attributes: PhraseAttributes,
    pub children: Vec<PhraseChild>,
    outer_xml: String,
}

impl Phrase {
    /// Build a phrase in memory
    pub fn new(attributes: PhraseAttributes, children: Vec<PhraseChild>) -> Self {
        Self {
            attributes,
            children,
            outer_xml: String::new(),
        }
    }

    /// The phrase element as written in the file
    pub fn outer_xml(&self) -> &str {
        &self.outer_xml
    }

    /// Text of the first child element named `language`, empty if none
    pub fn child_value(&self, language: &str) -> &str {
        self.children
            .iter()
            .find_map(|child| match child {
                PhraseChild::Language { name, text } if name == language => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Element children names, in document order
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            PhraseChild::Language { name, .. } => Some(name.as_str()),
            PhraseChild::Invalid { .. } => None,
        })
    }

    /// True when the phrase has at least one element child
    pub fn has_elements(&self) -> bool {
        self.languages().next().is_some()
    }

    /// True when the phrase targets an explicit record field
    pub fn is_direct(&self) -> bool {
        !self.attributes.item_id.is_empty() && !self.attributes.field_id.is_empty()
    }
}

/// Parsed phrase file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseDocument {
    phrases: Vec<Phrase>,
}

impl PhraseDocument {
    /// Read and parse a phrase file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(text.trim_start_matches('\u{feff}'))
    }

    /// Parse phrase XML
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut parser = Parser::default();

        loop {
            let start = reader.buffer_position();
            let event = reader.read_event()?;
            let end = reader.buffer_position();
            let raw = text.get(start..end).unwrap_or_default();

            match event {
                Event::Start(e) => parser.open(&e, start)?,
                Event::Empty(e) => parser.empty(&e)?,
                Event::Text(e) => {
                    if parser.depth >= 3 {
                        let content = std::str::from_utf8(&e).map_err(quick_xml::Error::from)?;
                        let content = normalize_line_endings(content);
                        let value = unescape(&content).map_err(quick_xml::Error::from)?;
                        parser.push_text(&value);
                    } else if !raw.trim().is_empty() {
                        parser.stray(raw)?;
                    }
                }
                Event::CData(e) => {
                    if parser.depth >= 3 {
                        let bytes = e.into_inner();
                        parser.push_text(&normalize_line_endings(&String::from_utf8_lossy(&bytes)));
                    } else {
                        parser.stray(raw)?;
                    }
                }
                Event::Comment(_) | Event::PI(_) => {
                    if parser.depth == 2 {
                        parser.stray(raw)?;
                    }
                }
                Event::End(_) => parser.close(text, end),
                Event::Eof => break,
                _ => {}
            }
        }

        parser.finish()
    }

    /// Phrases in document order
    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    /// Number of phrases
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// True when the document holds no phrases
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Languages offered for import: element names of the first phrase
    pub fn offered_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        if let Some(first) = self.phrases.first() {
            for name in first.languages() {
                if !languages.iter().any(|known| known == name) {
                    languages.push(name.to_string());
                }
            }
        }
        languages
    }
}

struct OpenPhrase {
    attributes: PhraseAttributes,
    children: Vec<PhraseChild>,
    start: usize,
}

#[derive(Default)]
struct Parser {
    depth: usize,
    saw_root: bool,
    in_root: bool,
    phrase: Option<OpenPhrase>,
    language: Option<(String, String)>,
    phrases: Vec<Phrase>,
}

impl Parser {
    fn open(&mut self, e: &BytesStart<'_>, start: usize) -> Result<()> {
        self.depth += 1;
        match self.depth {
            1 => self.enter_root(e)?,
            2 if self.in_root && e.local_name().as_ref() == PHRASE_ELEMENT => {
                self.phrase = Some(OpenPhrase {
                    attributes: read_attributes(e)?,
                    children: Vec::new(),
                    start,
                });
            }
            3 if self.phrase.is_some() => {
                self.language = Some((element_name(e), String::new()));
            }
            _ => {}
        }
        Ok(())
    }

    fn empty(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match self.depth {
            0 => {
                self.enter_root(e)?;
                self.in_root = false;
            }
            2 => {
                if let Some(phrase) = self.phrase.as_mut() {
                    phrase.children.push(PhraseChild::Language {
                        name: element_name(e),
                        text: String::new(),
                    });
                }
            }
            // Empty <phrase/> has no children and is not a phrase
            _ => {}
        }
        Ok(())
    }

    fn enter_root(&mut self, e: &BytesStart<'_>) -> Result<()> {
        if self.saw_root {
            return Err(ImportError::Malformed(
                "document has more than one root element".to_string(),
            ));
        }
        self.saw_root = true;
        self.in_root = e.local_name().as_ref() == ROOT_ELEMENT;
        Ok(())
    }

    fn push_text(&mut self, value: &str) {
        if let Some((_, text)) = self.language.as_mut() {
            text.push_str(value);
        }
    }

    fn stray(&mut self, raw: &str) -> Result<()> {
        match self.depth {
            0 => Err(ImportError::Malformed(
                "text outside the root element".to_string(),
            )),
            2 => {
                if let Some(phrase) = self.phrase.as_mut() {
                    phrase.children.push(PhraseChild::Invalid {
                        xml: raw.trim().to_string(),
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn close(&mut self, text: &str, end: usize) {
        match self.depth {
            3 => {
                if let (Some((name, value)), Some(phrase)) =
                    (self.language.take(), self.phrase.as_mut())
                {
                    phrase.children.push(PhraseChild::Language { name, text: value });
                }
            }
            2 => {
                if let Some(open) = self.phrase.take() {
                    let phrase = Phrase {
                        attributes: open.attributes,
                        children: open.children,
                        outer_xml: text.get(open.start..end).unwrap_or_default().to_string(),
                    };
                    if phrase.has_elements() {
                        self.phrases.push(phrase);
                    }
                }
            }
            _ => {}
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(self) -> Result<PhraseDocument> {
        if !self.saw_root {
            return Err(ImportError::Malformed("document has no root element".to_string()));
        }
        if self.depth != 0 {
            return Err(ImportError::Malformed("unexpected end of document".to_string()));
        }
        Ok(PhraseDocument {
            phrases: self.phrases,
        })
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Fold `\r\n` and lone `\r` into `\n`
fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Literal tabs and line breaks in an attribute value read as spaces;
/// character references such as `&#10;` survive
fn normalize_attribute(raw: &str) -> Cow<'_, str> {
    match normalize_line_endings(raw) {
        value if value.contains(['\t', '\n']) => Cow::Owned(value.replace(['\t', '\n'], " ")),
        value => value,
    }
}

fn read_attributes(e: &BytesStart<'_>) -> Result<PhraseAttributes> {
    let mut attributes = PhraseAttributes::default();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let raw = std::str::from_utf8(&attr.value).map_err(quick_xml::Error::from)?;
        let value = unescape(&normalize_attribute(raw))
            .map_err(quick_xml::Error::from)?
            .into_owned();
        match attr.key.as_ref() {
            b"key" => attributes.key = value,
            b"domain" => attributes.domain = value,
            b"itemid" => attributes.item_id = value,
            b"fieldid" => attributes.field_id = value,
            b"database" => attributes.database = value,
            b"path" => attributes.path = value,
            _ => {}
        }
    }
    Ok(attributes)
}
