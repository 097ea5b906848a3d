use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::marks::payload::PayloadValue;
use crate::marks::run::Run;
use crate::marks::sequence::{BlockId, RunSequence};

/// Before/after snapshot of one block, handed to the undo and persistence
/// layers once per completed mark operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub block_id: BlockId,
    pub before: String,
    pub after: String,
}

impl Transaction {
    pub fn new(block_id: BlockId, before: String, after: String) -> Self {
        Self {
            block_id,
            before,
            after,
        }
    }

    /// A transaction whose both sides are `snapshot`
    pub fn unchanged(block_id: BlockId, snapshot: String) -> Self {
        Self {
            block_id,
            after: snapshot.clone(),
            before: snapshot,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }

    /// The transaction that undoes this one
    pub fn inverted(&self) -> Self {
        Self {
            block_id: self.block_id.clone(),
            before: self.after.clone(),
            after: self.before.clone(),
        }
    }
}

/// Receiver of completed transactions (undo stack, persistence queue)
pub trait TransactionSink {
    fn submit(&mut self, transaction: Transaction);
}

impl TransactionSink for Vec<Transaction> {
    fn submit(&mut self, transaction: Transaction) {
        self.push(transaction);
    }
}

/// Serialize a block to the span markup used by the editing surface
pub fn serialize_block(sequence: &RunSequence) -> String {
    let mut html = format!(
        "<div data-node-id=\"{}\">",
        encode_double_quoted_attribute(sequence.block_id().as_str())
    );
    for run in sequence.runs() {
        write_run(&mut html, run);
    }
    html.push_str("</div>");
    html
}

fn write_run(html: &mut String, run: &Run) {
    let text = encode_text(run.text());
    if run.is_plain() {
        html.push_str(&text);
        return;
    }
    html.push_str(&format!("<span data-type=\"{}\"", run.tags().data_type()));
    for value in run.payload().values() {
        match value {
            PayloadValue::Link { href, color } => {
                attr(html, "data-href", href);
                if let Some(color) = color {
                    attr(html, "data-color", color);
                }
            }
            PayloadValue::BlockRef { id, subtype } => {
                attr(html, "data-id", id);
                attr(html, "data-subtype", subtype.code());
            }
            PayloadValue::FileAnnotation { id } => attr(html, "data-id", id),
            PayloadValue::Math { content } => attr(html, "data-content", content),
            PayloadValue::Memo { content } => attr(html, "data-inline-memo-content", content),
            PayloadValue::Style(style) => {
                if !style.is_empty() {
                    attr(html, "style", &style.css());
                }
            }
        }
    }
    html.push_str(&format!(">{text}</span>"));
}

fn attr(html: &mut String, name: &str, value: &str) {
    html.push_str(&format!(" {name}=\"{}\"", encode_double_quoted_attribute(value)));
}
