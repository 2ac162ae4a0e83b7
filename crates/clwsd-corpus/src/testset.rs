//! SemEval cross-lingual lexical sample test files.
//!
//! ```xml
//! <corpus lang="english">
//!   <lexelt item="bank.n">
//!     <instance id="1">
//!       <context>I went to the <head>bank</head> to deposit money .</context>
//!     </instance>
//!   </lexelt>
//! </corpus>
//! ```
//!
//! The format is flat and machine generated, so it is read with a handful of
//! patterns rather than a full XML parser. Contexts are kept untokenised.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use clwsd_types::LemmaKey;
use regex::Regex;

static CORPUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<corpus\b([^>]*)>").expect("valid regex"));
static LEXELT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<lexelt\b([^>]*)>(.*?)</lexelt>").expect("valid regex")
});
static INSTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<instance\b([^>]*)>(.*?)</instance>").expect("valid regex")
});
static CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<context\b[^>]*>(.*?)<head\b[^>]*>(.*?)</head>(.*?)</context>")
        .expect("valid regex")
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// Map a corpus `lang` attribute to a two-letter code. Accepts English and
/// native language names as well as the codes themselves.
pub fn language_code(name: &str) -> Option<&'static str> {
    let code = match name.trim().to_lowercase().as_str() {
        "english" | "en" => "en",
        "french" | "français" | "francais" | "fr" => "fr",
        "italian" | "italiano" | "it" => "it",
        "german" | "deutsch" | "de" => "de",
        "dutch" | "nederlands" | "nl" => "nl",
        "spanish" | "español" | "espanol" | "es" => "es",
        _ => return None,
    };
    Some(code)
}

/// One test occurrence, with its context split around the head word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestInstance {
    pub id: u64,
    pub left: String,
    pub head: String,
    pub right: String,
}

impl TestInstance {
    /// The full raw context on one line.
    pub fn raw_text(&self) -> String {
        let text = format!("{}{}{}", self.left, self.head, self.right);
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// All instances of one lexical element, sorted by id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lexelt {
    pub key: LemmaKey,
    pub instances: Vec<TestInstance>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestSet {
    /// Two-letter source language code.
    pub lang: String,
    /// Lexical elements in file order.
    pub lexelts: Vec<Lexelt>,
}

impl TestSet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("read test file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse test file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let corpus = CORPUS
            .captures(text)
            .ok_or_else(|| anyhow::anyhow!("not a valid test file: no <corpus> element"))?;
        let lang_name = attribute(&corpus[1], "lang")
            .ok_or_else(|| anyhow::anyhow!("<corpus> has no lang attribute"))?;
        let lang = language_code(&lang_name)
            .ok_or_else(|| anyhow::anyhow!("unknown corpus language {lang_name:?}"))?;

        let mut lexelts = Vec::new();
        for lexelt in LEXELT.captures_iter(text) {
            let item = attribute(&lexelt[1], "item")
                .ok_or_else(|| anyhow::anyhow!("<lexelt> has no item attribute"))?;
            let key = LemmaKey::parse_item(&item)
                .ok_or_else(|| anyhow::anyhow!("lexelt item {item:?} is not lemma.pos"))?;
            let mut instances = Vec::new();
            for instance in INSTANCE.captures_iter(&lexelt[2]) {
                let raw_id = attribute(&instance[1], "id")
                    .ok_or_else(|| anyhow::anyhow!("{item}: <instance> has no id attribute"))?;
                let id: u64 = raw_id
                    .trim()
                    .parse()
                    .with_context(|| format!("{item}: instance id {raw_id:?}"))?;
                let context = CONTEXT.captures(&instance[2]).ok_or_else(|| {
                    anyhow::anyhow!("{item} instance {id}: no <context> with a <head>")
                })?;
                instances.push(TestInstance {
                    id,
                    left: unescape(&context[1]),
                    head: unescape(context[2].trim()),
                    right: unescape(&context[3]),
                });
            }
            instances.sort_by_key(|i| i.id);
            lexelts.push(Lexelt { key, instances });
        }
        Ok(Self {
            lang: lang.to_string(),
            lexelts,
        })
    }

    pub fn get(&self, key: &LemmaKey) -> Option<&Lexelt> {
        self.lexelts.iter().find(|l| &l.key == key)
    }
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    ATTRIBUTE
        .captures_iter(attrs)
        .find(|c| &c[1] == name)
        .and_then(|c| c.get(2).or_else(|| c.get(3)))
        .map(|m| unescape(m.as_str()))
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<corpus lang="english">
<lexelt item="bank.n">
<instance id="12">
<context>The river <head>bank</head> was muddy .</context>
</instance>
<instance id="3">
<context><head>Bank</head> fees &amp; charges rose .</context>
</instance>
</lexelt>
<lexelt item="coach.n">
<instance id="1">
<context>The coach left .</context>
</instance>
</lexelt>
</corpus>
"#;

    #[test]
    fn maps_language_names() {
        assert_eq!(language_code("English"), Some("en"));
        assert_eq!(language_code("Español"), Some("es"));
        assert_eq!(language_code("nl"), Some("nl"));
        assert_eq!(language_code("klingon"), None);
    }

    #[test]
    fn instance_without_head_is_rejected() {
        let err = TestSet::parse(XML).unwrap_err();
        assert!(format!("{err:#}").contains("coach.n instance 1"));
    }

    #[test]
    fn parses_and_sorts_instances() {
        let xml = XML.replace(
            "<context>The coach left .</context>",
            "<context>The <head>coach</head> left .</context>",
        );
        let set = TestSet::parse(&xml).unwrap();
        assert_eq!(set.lang, "en");
        assert_eq!(set.lexelts.len(), 2);
        let bank = set.get(&LemmaKey::new("bank", "n")).unwrap();
        assert_eq!(bank.instances[0].id, 3);
        assert_eq!(bank.instances[0].left, "");
        assert_eq!(bank.instances[0].right, " fees & charges rose .");
        assert_eq!(bank.instances[1].left, "The river ");
        assert_eq!(bank.instances[1].raw_text(), "The river bank was muddy .");
    }
}
