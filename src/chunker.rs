//! Splits ingested files into passages small enough to embed.
//!
//! Paragraphs (blank-line separated) are packed greedily up to `chunk_size`
//! characters. A paragraph that is larger on its own is cut, preferring the
//! last sentence end in the second half of the window.

const SENTENCE_ENDS: [char; 5] = ['.', '!', '?', '\n', '。'];

/// Split `text` into trimmed, non-empty chunks of at most `chunk_size` chars.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let normalized = text.replace("\r\n", "\n");

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in normalized.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = para.chars().count();

        if current_len > 0 && current_len + 2 + para_len > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if para_len > chunk_size {
            chunks.extend(split_long(para, chunk_size));
            continue;
        }

        if current_len > 0 {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(para);
        current_len += para_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long(para: &str, size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = para.trim();

    while let Some((window_end, _)) = rest.char_indices().nth(size) {
        let min = rest.char_indices().nth(size / 2).map_or(0, |(i, _)| i);
        let cut = rest[..window_end]
            .char_indices()
            .rev()
            .take_while(|(i, _)| *i >= min)
            .find(|(_, c)| SENTENCE_ENDS.contains(c))
            .map_or(window_end, |(i, c)| i + c.len_utf8());

        pieces.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}
