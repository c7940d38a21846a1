//! Story chunker
//!
//! Splits narrative markdown into ordered, size-bounded chunks. Section
//! boundaries (heading lines) are preferred; a single oversized section is
//! cut on paragraph breaks, or hard-cut when no usable break exists.

use tracing::debug;

use super::types::Chunk;

/// A paragraph break must sit past this share of the limit to be used
const MIN_BREAK_PERCENT: usize = 45;

/// Split `text` into chunks of at most `max_chars` characters
///
/// Indices are assigned in emission order starting at 1. Empty input yields
/// no chunks; the caller decides whether that is fatal.
pub fn chunk_story(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max = max_chars.max(1);
    debug!(text_len = text.len(), %max, "chunk_story: called");

    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for section in split_sections(text) {
        let len = char_len(section);
        if len > max {
            debug!(section_chars = %len, "chunk_story: force-splitting oversized section");
            flush(&mut buffer, &mut chunks);
            for piece in split_long_section(section, max) {
                push_chunk(&mut chunks, piece);
            }
            continue;
        }

        if !buffer.is_empty() && char_len(&buffer) + len > max {
            flush(&mut buffer, &mut chunks);
        }
        buffer.push_str(section);
    }
    flush(&mut buffer, &mut chunks);

    debug!(chunk_count = chunks.len(), "chunk_story: done");
    chunks
}

/// Split text into top-level sections, each starting at a heading line
///
/// Text before the first heading forms its own section. Lines inside fenced
/// code blocks never start a section. The returned slices cover `text`
/// exactly, in order.
pub fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence && is_heading_line(line) && offset > start {
            sections.push(&text[start..offset]);
            start = offset;
        }
        offset += line.len();
    }

    if start < text.len() {
        sections.push(&text[start..]);
    }
    sections
}

/// `#` through `######` followed by whitespace or end of line
pub fn is_heading_line(line: &str) -> bool {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return false;
    }
    match line[hashes..].chars().next() {
        None => true,
        Some(c) => c.is_whitespace(),
    }
}

fn split_long_section(section: &str, max: usize) -> Vec<&str> {
    let min_break = max * MIN_BREAK_PERCENT / 100;
    let mut pieces = Vec::new();
    let mut rest = section;

    while char_len(rest) > max {
        let window_end = byte_index_at_char(rest, max);
        let floor = byte_index_at_char(rest, min_break);
        let cut = match rest[..window_end].rfind("\n\n") {
            Some(idx) if idx > floor => idx,
            _ => window_end,
        };
        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

fn flush(buffer: &mut String, chunks: &mut Vec<Chunk>) {
    if !buffer.is_empty() {
        push_chunk(chunks, buffer);
        buffer.clear();
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    chunks.push(Chunk {
        index: chunks.len() + 1,
        text: text.to_string(),
    });
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn byte_index_at_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
