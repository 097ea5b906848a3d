// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use runemark_engine::marks::{BlockId, Run, RunSequence, Tag};

/// A block of `runs` alternating plain and styled words
#[allow(dead_code)]
pub fn generate_block(runs: usize) -> RunSequence {
    let styles = [Tag::Strong, Tag::Em, Tag::Highlight, Tag::Underline];
    let runs = (0..runs).map(|i| {
        let text = format!("word{i} ");
        if i % 2 == 0 {
            Run::plain(text)
        } else {
            Run::new(text, [styles[i % styles.len()]])
        }
    });
    RunSequence::from_runs(BlockId::new("bench"), runs)
}
