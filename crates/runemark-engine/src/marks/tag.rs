use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An inline attribute kind a run can carry.
///
/// The serialized names are the `data-type` tokens used by the block HTML,
/// so `Strike` is `"s"`, `Link` is `"a"` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    /// Font-styled span (color, background, size) with a `TextStyle` payload
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "strong")]
    Strong,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "s")]
    Strike,
    #[serde(rename = "u")]
    Underline,
    #[serde(rename = "code")]
    Code,
    #[serde(rename = "mark")]
    Highlight,
    #[serde(rename = "sup")]
    Superscript,
    #[serde(rename = "sub")]
    Subscript,
    #[serde(rename = "kbd")]
    Kbd,
    /// Hyperlink, payload: href + display color
    #[serde(rename = "a")]
    Link,
    /// Reference to another block, payload: target id + subtype
    #[serde(rename = "block-ref")]
    BlockRef,
    #[serde(rename = "virtual-block-ref")]
    VirtualBlockRef,
    #[serde(rename = "file-annotation-ref")]
    FileAnnotationRef,
    /// Inline formula, payload: formula source
    #[serde(rename = "inline-math")]
    InlineMath,
    /// Footnote-style memo, payload: memo text
    #[serde(rename = "inline-memo")]
    InlineMemo,
    #[serde(rename = "tag")]
    Hashtag,
    #[serde(rename = "backslash")]
    Backslash,
    #[serde(rename = "search-mark")]
    SearchMark,
}

impl Tag {
    pub const ALL: [Tag; 19] = [
        Tag::Text,
        Tag::Strong,
        Tag::Em,
        Tag::Strike,
        Tag::Underline,
        Tag::Code,
        Tag::Highlight,
        Tag::Superscript,
        Tag::Subscript,
        Tag::Kbd,
        Tag::Link,
        Tag::BlockRef,
        Tag::VirtualBlockRef,
        Tag::FileAnnotationRef,
        Tag::InlineMath,
        Tag::InlineMemo,
        Tag::Hashtag,
        Tag::Backslash,
        Tag::SearchMark,
    ];

    /// The `data-type` token for this tag
    pub fn data_type(self) -> &'static str {
        match self {
            Tag::Text => "text",
            Tag::Strong => "strong",
            Tag::Em => "em",
            Tag::Strike => "s",
            Tag::Underline => "u",
            Tag::Code => "code",
            Tag::Highlight => "mark",
            Tag::Superscript => "sup",
            Tag::Subscript => "sub",
            Tag::Kbd => "kbd",
            Tag::Link => "a",
            Tag::BlockRef => "block-ref",
            Tag::VirtualBlockRef => "virtual-block-ref",
            Tag::FileAnnotationRef => "file-annotation-ref",
            Tag::InlineMath => "inline-math",
            Tag::InlineMemo => "inline-memo",
            Tag::Hashtag => "tag",
            Tag::Backslash => "backslash",
            Tag::SearchMark => "search-mark",
        }
    }

    /// Whether this tag only makes sense together with a payload value
    pub fn requires_payload(self) -> bool {
        matches!(
            self,
            Tag::Text
                | Tag::Link
                | Tag::BlockRef
                | Tag::FileAnnotationRef
                | Tag::InlineMath
                | Tag::InlineMemo
        )
    }

    /// Style-like tags are the ones a generic "clear" strips
    pub fn is_style_like(self) -> bool {
        TagSet::STYLE_LIKE.contains(self)
    }

    /// Reference-like tags point somewhere or carry content of their own
    pub fn is_reference_like(self) -> bool {
        TagSet::REFERENCE_LIKE.contains(self)
    }

    /// Kinds that keep a leading placeholder so the caret does not visually
    /// fuse with the neighbouring style
    pub fn needs_marker(self) -> bool {
        TagSet::MARKER_KINDS.contains(self)
    }

    fn bit(self) -> u32 {
        1u32 << (self as u32)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown inline tag: {0}")]
pub struct UnknownTag(pub String);

impl FromStr for Tag {
    type Err = UnknownTag;

    /// Accepts the `data-type` token as well as the long descriptive name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "text" | "plain-text" => Tag::Text,
            "strong" | "bold" => Tag::Strong,
            "em" | "italic" => Tag::Em,
            "s" | "strike" => Tag::Strike,
            "u" | "underline" => Tag::Underline,
            "code" => Tag::Code,
            "mark" | "highlight" => Tag::Highlight,
            "sup" | "superscript" => Tag::Superscript,
            "sub" | "subscript" => Tag::Subscript,
            "kbd" | "keyboard-key" => Tag::Kbd,
            "a" | "link" | "hyperlink" => Tag::Link,
            "block-ref" | "block-reference" => Tag::BlockRef,
            "virtual-block-ref" | "virtual-block-reference" => Tag::VirtualBlockRef,
            "file-annotation-ref" | "file-annotation-reference" => Tag::FileAnnotationRef,
            "inline-math" => Tag::InlineMath,
            "inline-memo" => Tag::InlineMemo,
            "tag" | "hashtag" => Tag::Hashtag,
            "backslash" => Tag::Backslash,
            "search-mark" => Tag::SearchMark,
            other => return Err(UnknownTag(other.to_string())),
        };
        Ok(tag)
    }
}

/// A set of tags stored as a bit mask; iteration follows declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Tag>", into = "Vec<Tag>")]
pub struct TagSet(u32);

impl TagSet {
    pub const EMPTY: TagSet = TagSet(0);

    pub const STYLE_LIKE: TagSet = TagSet::from_slice(&[
        Tag::Text,
        Tag::Strong,
        Tag::Em,
        Tag::Strike,
        Tag::Underline,
        Tag::Highlight,
        Tag::Superscript,
        Tag::Subscript,
        Tag::Kbd,
        Tag::Code,
    ]);

    pub const REFERENCE_LIKE: TagSet = TagSet::from_slice(&[
        Tag::BlockRef,
        Tag::VirtualBlockRef,
        Tag::FileAnnotationRef,
        Tag::Link,
        Tag::InlineMath,
        Tag::InlineMemo,
        Tag::Hashtag,
    ]);

    pub const MARKER_KINDS: TagSet = TagSet::from_slice(&[Tag::Code, Tag::Kbd, Tag::Hashtag]);

    /// Tags that never light up a toolbar button
    pub const NOT_HIGHLIGHTED: TagSet = TagSet::from_slice(&[
        Tag::SearchMark,
        Tag::Link,
        Tag::BlockRef,
        Tag::VirtualBlockRef,
        Tag::Text,
        Tag::FileAnnotationRef,
        Tag::InlineMath,
        Tag::InlineMemo,
        Tag::Backslash,
    ]);

    pub const fn from_slice(tags: &[Tag]) -> TagSet {
        let mut bits = 0u32;
        let mut i = 0;
        while i < tags.len() {
            bits |= 1u32 << (tags[i] as u32);
            i += 1;
        }
        TagSet(bits)
    }

    pub fn single(tag: Tag) -> TagSet {
        TagSet(tag.bit())
    }

    pub fn contains(self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn insert(&mut self, tag: Tag) -> bool {
        let had = self.contains(tag);
        self.0 |= tag.bit();
        !had
    }

    pub fn remove(&mut self, tag: Tag) -> bool {
        let had = self.contains(tag);
        self.0 &= !tag.bit();
        had
    }

    pub fn with(mut self, tag: Tag) -> TagSet {
        self.insert(tag);
        self
    }

    pub fn without(mut self, tag: Tag) -> TagSet {
        self.remove(tag);
        self
    }

    pub fn union(self, other: TagSet) -> TagSet {
        TagSet(self.0 | other.0)
    }

    pub fn intersection(self, other: TagSet) -> TagSet {
        TagSet(self.0 & other.0)
    }

    pub fn difference(self, other: TagSet) -> TagSet {
        TagSet(self.0 & !other.0)
    }

    pub fn intersects(self, other: TagSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Tag> {
        Tag::ALL.into_iter().filter(move |tag| self.contains(*tag))
    }

    /// The only tag in the set, if it holds exactly one
    pub fn sole(self) -> Option<Tag> {
        if self.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }

    /// Space-separated `data-type` attribute value
    pub fn data_type(self) -> String {
        self.iter()
            .map(Tag::data_type)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<Vec<Tag>> for TagSet {
    fn from(tags: Vec<Tag>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TagSet> for Vec<Tag> {
    fn from(set: TagSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::EMPTY;
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl<const N: usize> From<[Tag; N]> for TagSet {
    fn from(tags: [Tag; N]) -> Self {
        tags.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("strong", Tag::Strong)]
    #[case("s", Tag::Strike)]
    #[case("strike", Tag::Strike)]
    #[case("a", Tag::Link)]
    #[case("hyperlink", Tag::Link)]
    #[case("tag", Tag::Hashtag)]
    #[case("plain-text", Tag::Text)]
    #[case("file-annotation-reference", Tag::FileAnnotationRef)]
    fn test_parses_data_type_and_long_names(#[case] input: &str, #[case] expected: Tag) {
        assert_eq!(input.parse::<Tag>(), Ok(expected));
    }

    #[test]
    fn test_every_data_type_parses_back() {
        for tag in Tag::ALL {
            assert_eq!(tag.data_type().parse::<Tag>(), Ok(tag));
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        assert_eq!(
            "blink".parse::<Tag>(),
            Err(UnknownTag("blink".to_string()))
        );
    }

    #[test]
    fn test_set_iterates_in_declaration_order() {
        let set = TagSet::from([Tag::Link, Tag::Strong, Tag::Em]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Tag::Strong, Tag::Em, Tag::Link]);
        assert_eq!(set.data_type(), "strong em a");
    }

    #[test]
    fn test_insert_and_remove_report_changes() {
        let mut set = TagSet::EMPTY;
        assert!(set.insert(Tag::Code));
        assert!(!set.insert(Tag::Code));
        assert!(set.remove(Tag::Code));
        assert!(!set.remove(Tag::Code));
        assert!(set.is_empty());
    }

    #[test]
    fn test_sole_only_for_singletons() {
        assert_eq!(TagSet::single(Tag::Link).sole(), Some(Tag::Link));
        assert_eq!(TagSet::EMPTY.sole(), None);
        assert_eq!(TagSet::from([Tag::Em, Tag::Strong]).sole(), None);
    }

    #[test]
    fn test_categories_match_vocabulary() {
        assert!(Tag::Kbd.is_style_like());
        assert!(!Tag::Link.is_style_like());
        assert!(Tag::Hashtag.is_reference_like());
        assert!(Tag::Code.needs_marker());
        assert!(!Tag::Strong.needs_marker());
    }

    #[test]
    fn test_serde_uses_data_type_names() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            tags: TagSet,
        }
        let holder: Holder = toml::from_str(r#"tags = ["strong", "sup"]"#).unwrap();
        assert_eq!(holder.tags, TagSet::from([Tag::Strong, Tag::Superscript]));
        let back = toml::to_string(&holder).unwrap();
        assert_eq!(back.trim(), r#"tags = ["strong", "sup"]"#);
    }
}
