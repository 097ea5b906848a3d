use serde::{Deserialize, Serialize};

use crate::marks::tag::{Tag, TagSet};

/// Tunable boundary rules of the mark engine.
///
/// Deserializes from the `[marks]` table of the configuration file; every
/// field falls back to its default when missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkPolicy {
    /// A generic clear is refused when the covered range carries exactly one
    /// of these tags and nothing else
    pub clear_guard: TagSet,
    /// Tags not carried onto a placeholder created at the end of a run
    pub end_inheritance_suppressed: TagSet,
    /// Display text for a link created over an empty range
    pub empty_link_text: String,
    /// Leave trailing line breaks of covered runs unmarked when adding
    pub split_trailing_newlines: bool,
}

impl Default for MarkPolicy {
    fn default() -> Self {
        Self {
            clear_guard: TagSet::REFERENCE_LIKE,
            end_inheritance_suppressed: TagSet::from([
                Tag::InlineMemo,
                Tag::Text,
                Tag::BlockRef,
                Tag::VirtualBlockRef,
                Tag::FileAnnotationRef,
                Tag::Link,
            ]),
            empty_link_text: "*".to_string(),
            split_trailing_newlines: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let policy: MarkPolicy = toml::from_str("empty_link_text = \"link\"").unwrap();
        assert_eq!(policy.empty_link_text, "link");
        assert_eq!(policy.clear_guard, TagSet::REFERENCE_LIKE);
        assert!(policy.split_trailing_newlines);
    }

    #[test]
    fn test_tag_lists_use_data_type_names() {
        let policy: MarkPolicy = toml::from_str(
            r#"
clear_guard = ["a", "block-ref"]
end_inheritance_suppressed = []
"#,
        )
        .unwrap();
        assert_eq!(policy.clear_guard, TagSet::from([Tag::Link, Tag::BlockRef]));
        assert!(policy.end_inheritance_suppressed.is_empty());
    }
}
