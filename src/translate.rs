use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Wrapper tag pair CashCtrl uses for multilingual custom fields, e.g.
/// `<values><de>Rechnung</de><en>Invoice</en></values>`.
const WRAPPER_OPEN: &str = "<values>";
const WRAPPER_CLOSE: &str = "</values>";

/// Key under which plain, untranslated text is stored after decoding.
pub const LITERAL_KEY: &str = "value";

fn open_tag() -> &'static Regex {
    static OPEN_TAG: OnceLock<Regex> = OnceLock::new();
    OPEN_TAG.get_or_init(|| Regex::new(r"<(\w+)>").expect("static regex"))
}

/// Language-code to text mapping with stable insertion order. The remote
/// system is order-sensitive on re-encode, so a hash map won't do.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Translations {
    entries: Vec<(String, String)>,
}

impl Translations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn literal(text: &str) -> Self {
        let mut translations = Self::new();
        translations.insert(LITERAL_KEY, text);
        translations
    }

    /// Inserts or overwrites a language entry, keeping first-insert order.
    pub fn insert(&mut self, lang: &str, text: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == lang) {
            Some((_, value)) => *value = text.to_string(),
            None => self.entries.push((lang.to_string(), text.to_string())),
        }
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == lang)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Translations {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut translations = Self::new();
        for (lang, text) in iter {
            translations.insert(lang, text);
        }
        translations
    }
}

impl fmt::Display for Translations {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", encode(self))
    }
}

/// True iff the text carries the multilingual wrapper.
pub fn is_encoded(text: &str) -> bool {
    text.contains(WRAPPER_OPEN) && text.contains(WRAPPER_CLOSE)
}

/// Parses the wrapper format into a keyed mapping.
///
/// Text without any tag markers decodes to a single entry under
/// [`LITERAL_KEY`]. A wrapper with malformed content decodes to an empty
/// mapping; callers fall back to the raw text in that case.
pub fn decode(text: &str) -> Translations {
    if !text.contains('<') {
        return Translations::literal(text);
    }

    let Some(inner) = wrapped_content(text) else {
        return Translations::new();
    };

    let mut translations = Translations::new();
    let mut rest = inner;
    while let Some(tag) = open_tag().find(rest) {
        let lang = &tag.as_str()[1..tag.len() - 1];
        let close = format!("</{}>", lang);
        let after_open = &rest[tag.end()..];
        match after_open.find(&close) {
            Some(end) => {
                translations.insert(lang, &after_open[..end]);
                rest = &after_open[end + close.len()..];
            }
            // Unterminated tag, skip past it and keep scanning.
            None => rest = after_open,
        }
    }
    translations
}

/// Picks the requested language out of an encoded field, or returns the
/// input unchanged when it is not encoded or lacks that language.
pub fn resolve(text: &str, lang: &str) -> String {
    if !is_encoded(text) {
        return text.to_string();
    }
    decode(text)
        .get(lang)
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string())
}

/// Re-encodes a mapping into the wire format, preserving entry order.
///
/// Values containing `<` or `>` are written verbatim; such values are not
/// guaranteed to survive a decode.
pub fn encode(translations: &Translations) -> String {
    let mut out = String::from(WRAPPER_OPEN);
    for (lang, text) in translations.iter() {
        out.push('<');
        out.push_str(lang);
        out.push('>');
        out.push_str(text);
        out.push_str("</");
        out.push_str(lang);
        out.push('>');
    }
    out.push_str(WRAPPER_CLOSE);
    out
}

fn wrapped_content(text: &str) -> Option<&str> {
    let start = text.find(WRAPPER_OPEN)? + WRAPPER_OPEN.len();
    let len = text[start..].find(WRAPPER_CLOSE)?;
    Some(&text[start..start + len])
}
