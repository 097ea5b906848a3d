use crate::marks::exclusivity::resolve;
use crate::marks::payload::{Payload, PayloadValue};
use crate::marks::tag::{Tag, TagSet};

/// Zero-width space holding an otherwise empty run open for the caret
pub const PLACEHOLDER: char = '\u{200b}';

/// Atomic span of styled text.
///
/// A run's text is never empty: an empty run holds the placeholder instead.
/// Its tag set never contains two mutually exclusive tags, and its payload
/// only has entries for tags it carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Run {
    text: String,
    tags: TagSet,
    payload: Payload,
}

impl Run {
    /// Untagged text
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, TagSet::EMPTY)
    }

    /// Tags are inserted one by one through exclusivity resolution
    pub fn new(text: impl Into<String>, tags: impl Into<TagSet>) -> Self {
        let tags: TagSet = tags.into();
        Self {
            text: non_empty(text.into()),
            tags: tags.iter().fold(TagSet::EMPTY, resolve),
            payload: Payload::new(),
        }
    }

    /// A run holding only the placeholder
    pub fn placeholder(tags: impl Into<TagSet>) -> Self {
        Self::new(PLACEHOLDER.to_string(), tags)
    }

    /// Attach a payload value, adding its tag if missing
    pub fn with_payload(mut self, value: PayloadValue) -> Self {
        self.set_tag(value.tag(), Some(value));
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> TagSet {
        self.tags
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn has(&self, tag: Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_plain(&self) -> bool {
        self.tags.is_empty()
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Runs are never empty; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True when the text is nothing but placeholder characters
    pub fn is_placeholder(&self) -> bool {
        self.text.chars().all(|c| c == PLACEHOLDER)
    }

    /// Text with placeholder characters removed
    pub fn visible_text(&self) -> String {
        self.text.chars().filter(|&c| c != PLACEHOLDER).collect()
    }

    pub fn needs_marker(&self) -> bool {
        self.tags.intersects(TagSet::MARKER_KINDS)
    }

    pub fn leading_placeholders(&self) -> usize {
        self.text.chars().take_while(|&c| c == PLACEHOLDER).count()
    }

    pub fn trailing_placeholders(&self) -> usize {
        self.text.chars().rev().take_while(|&c| c == PLACEHOLDER).count()
    }

    /// Add `tag` through exclusivity resolution; dropped tags lose their payload
    pub(crate) fn set_tag(&mut self, tag: Tag, value: Option<PayloadValue>) {
        self.tags = resolve(self.tags, tag);
        self.payload.retain_tags(self.tags);
        if let Some(value) = value {
            self.payload.insert(value);
        }
    }

    pub(crate) fn remove_tag(&mut self, tag: Tag) -> bool {
        self.payload.remove(tag);
        self.tags.remove(tag)
    }

    pub(crate) fn set_tags(&mut self, tags: TagSet) {
        self.tags = tags;
        self.payload.retain_tags(tags);
    }

    pub(crate) fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub(crate) fn set_text(&mut self, text: String) {
        self.text = non_empty(text);
    }

    /// Split into the first `at` characters and the rest; both keep tags and payload
    pub(crate) fn split_off(&mut self, at: usize) -> Run {
        let byte = char_to_byte(&self.text, at);
        let right = self.text.split_off(byte);
        Run {
            text: non_empty(right),
            tags: self.tags,
            payload: self.payload.clone(),
        }
    }

    /// Remove `count` characters starting at `at`
    pub(crate) fn delete_chars(&mut self, at: usize, count: usize) {
        let start = char_to_byte(&self.text, at);
        let end = char_to_byte(&self.text, at + count);
        self.text.replace_range(start..end, "");
        if self.text.is_empty() {
            self.text.push(PLACEHOLDER);
        }
    }

    pub(crate) fn insert_char(&mut self, at: usize, c: char) {
        let byte = char_to_byte(&self.text, at);
        self.text.insert(byte, c);
    }

    /// Drop a `text` tag whose style carries nothing
    pub(crate) fn settle(&mut self) {
        if self.tags.contains(Tag::Text) && self.payload.style().is_none_or(|s| s.is_empty()) {
            self.remove_tag(Tag::Text);
        }
    }
}

fn non_empty(text: String) -> String {
    if text.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        text
    }
}

/// Byte index of the `chars`-th character, clamped to the end
pub(crate) fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
