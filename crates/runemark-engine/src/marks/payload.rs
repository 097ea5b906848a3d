use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::marks::tag::{Tag, TagSet};

/// Whether a block reference tracks the target's content or keeps its own text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefSubtype {
    /// Anchor text follows the referenced block
    #[default]
    #[serde(rename = "d")]
    Dynamic,
    /// Anchor text is fixed
    #[serde(rename = "s")]
    Static,
}

impl RefSubtype {
    pub fn code(self) -> &'static str {
        match self {
            RefSubtype::Dynamic => "d",
            RefSubtype::Static => "s",
        }
    }
}

/// Font styling carried by the `text` tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
}

impl TextStyle {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.background_color.is_none() && self.font_size.is_none()
    }

    /// CSS declaration list for the `style` attribute
    pub fn css(&self) -> String {
        let mut parts = Vec::new();
        if let Some(color) = &self.color {
            parts.push(format!("color: {color};"));
        }
        if let Some(background) = &self.background_color {
            parts.push(format!("background-color: {background};"));
        }
        if let Some(size) = &self.font_size {
            parts.push(format!("font-size: {size};"));
        }
        parts.join(" ")
    }
}

/// Typed payload attached to one tag of a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PayloadValue {
    Link {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    BlockRef {
        id: String,
        #[serde(default)]
        subtype: RefSubtype,
    },
    FileAnnotation {
        id: String,
    },
    Math {
        content: String,
    },
    Memo {
        content: String,
    },
    Style(TextStyle),
}

impl PayloadValue {
    /// The tag this payload belongs to
    pub fn tag(&self) -> Tag {
        match self {
            PayloadValue::Link { .. } => Tag::Link,
            PayloadValue::BlockRef { .. } => Tag::BlockRef,
            PayloadValue::FileAnnotation { .. } => Tag::FileAnnotationRef,
            PayloadValue::Math { .. } => Tag::InlineMath,
            PayloadValue::Memo { .. } => Tag::InlineMemo,
            PayloadValue::Style(_) => Tag::Text,
        }
    }

    pub fn link(href: impl Into<String>) -> Self {
        PayloadValue::Link {
            href: href.into(),
            color: None,
        }
    }

    pub fn block_ref(id: impl Into<String>) -> Self {
        PayloadValue::BlockRef {
            id: id.into(),
            subtype: RefSubtype::default(),
        }
    }

    pub fn math(content: impl Into<String>) -> Self {
        PayloadValue::Math {
            content: content.into(),
        }
    }

    pub fn memo(content: impl Into<String>) -> Self {
        PayloadValue::Memo {
            content: content.into(),
        }
    }
}

/// Payload values of a run, at most one per tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(BTreeMap<Tag, PayloadValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: Tag) -> Option<&PayloadValue> {
        self.0.get(&tag)
    }

    pub fn insert(&mut self, value: PayloadValue) -> Option<PayloadValue> {
        self.0.insert(value.tag(), value)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<PayloadValue> {
        self.0.remove(&tag)
    }

    /// Drop payload entries whose tag is not in `tags`
    pub fn retain_tags(&mut self, tags: TagSet) {
        self.0.retain(|tag, _| tags.contains(*tag));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &PayloadValue> {
        self.0.values()
    }

    pub fn href(&self) -> Option<&str> {
        match self.get(Tag::Link) {
            Some(PayloadValue::Link { href, .. }) => Some(href),
            _ => None,
        }
    }

    pub fn math_content(&self) -> Option<&str> {
        match self.get(Tag::InlineMath) {
            Some(PayloadValue::Math { content }) => Some(content),
            _ => None,
        }
    }

    pub fn memo_content(&self) -> Option<&str> {
        match self.get(Tag::InlineMemo) {
            Some(PayloadValue::Memo { content }) => Some(content),
            _ => None,
        }
    }

    pub fn style(&self) -> Option<&TextStyle> {
        match self.get(Tag::Text) {
            Some(PayloadValue::Style(style)) => Some(style),
            _ => None,
        }
    }
}

impl FromIterator<PayloadValue> for Payload {
    fn from_iter<I: IntoIterator<Item = PayloadValue>>(iter: I) -> Self {
        let mut payload = Payload::new();
        for value in iter {
            payload.insert(value);
        }
        payload
    }
}
