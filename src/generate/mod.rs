mod client;
pub mod js;
pub mod output;

pub use client::generate;
pub use output::{Output, ScriptChunk};

/// Reconciliation runtime, emitted verbatim ahead of the generated code
pub const RUNTIME: &str = include_str!("runtime.js");

/// Join chunks into the final script
pub fn join_chunks(chunks: &[ScriptChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.code.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
