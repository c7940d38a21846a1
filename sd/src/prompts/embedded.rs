//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System prompt: the JSON-only operations contract
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// Per-chunk user prompt
pub const USER: &str = include_str!("../../prompts/user.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "user" => Some(USER),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
