//! Recursive character splitter. Splits on a ladder of separators, merging
//! adjacent pieces into chunks of roughly the target size with a sliding
//! overlap. Pieces carry their byte offsets through the recursion, so every
//! chunk knows exactly where it started in the source text.

const CHUNK_SIZE: usize = 1000;
const CHUNK_OVERLAP: usize = 200;
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    /// Byte offset of the chunk start in the source text.
    pub start_index: usize,
}

/// One piece produced by separator splitting, before merging.
#[derive(Debug)]
struct Piece {
    text: String,
    /// Absolute byte offset in the source text.
    offset: usize,
    /// Length in characters, the unit the size budget is measured in.
    chars: usize,
}

/// Split text into overlapping chunks with the default ladder.
pub fn split_text(text: &str) -> Vec<Chunk> {
    split_text_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

/// Split text with explicit sizing, for tests.
pub fn split_text_with(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    split_recursive(text, 0, &SEPARATORS, chunk_size, chunk_overlap, &mut chunks);

    chunks.retain(|chunk| !chunk.content.is_empty());
    chunks
}

fn split_recursive(
    text: &str,
    base: usize,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
    out: &mut Vec<Chunk>,
) {
    // Pick the first separator present in the text; "" always matches and
    // degrades to per-character splitting.
    let (index, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len() - 1, ""));

    let remaining = &separators[index + 1..];

    // The separator stays attached to the preceding piece, so concatenating
    // pieces reproduces the source and offsets stay exact.
    let pieces: Vec<Piece> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| Piece {
                text: c.to_string(),
                offset: base + i,
                chars: 1,
            })
            .collect()
    } else {
        let mut offset = base;

        text.split_inclusive(separator)
            .map(|piece| {
                let start = offset;
                offset += piece.len();

                Piece {
                    text: piece.to_string(),
                    offset: start,
                    chars: piece.chars().count(),
                }
            })
            .collect()
    };

    let mut good_pieces: Vec<Piece> = Vec::new();

    for piece in pieces {
        if piece.chars < chunk_size {
            good_pieces.push(piece);
            continue;
        }

        if !good_pieces.is_empty() {
            merge_pieces(out, std::mem::take(&mut good_pieces), chunk_size, chunk_overlap);
        }

        if remaining.is_empty() {
            out.push(Chunk {
                start_index: piece.offset,
                content: piece.text,
            });
        } else {
            split_recursive(&piece.text, piece.offset, remaining, chunk_size, chunk_overlap, out);
        }
    }

    if !good_pieces.is_empty() {
        merge_pieces(out, good_pieces, chunk_size, chunk_overlap);
    }
}

/// Merge small pieces into chunks close to the target size, carrying a tail
/// of roughly `chunk_overlap` characters into the next chunk.
fn merge_pieces(out: &mut Vec<Chunk>, pieces: Vec<Piece>, chunk_size: usize, chunk_overlap: usize) {
    let mut current: Vec<Piece> = Vec::new();
    let mut total = 0usize;

    for piece in pieces {
        if total + piece.chars > chunk_size && !current.is_empty() {
            out.push(chunk_from(&current));

            // Drop leading pieces until the retained tail fits the overlap
            // budget and leaves room for the incoming piece.
            while total > chunk_overlap || (total + piece.chars > chunk_size && total > 0) {
                total -= current[0].chars;
                current.remove(0);
            }
        }

        total += piece.chars;
        current.push(piece);
    }

    if !current.is_empty() {
        out.push(chunk_from(&current));
    }
}

fn chunk_from(pieces: &[Piece]) -> Chunk {
    Chunk {
        start_index: pieces[0].offset,
        content: pieces.iter().map(|p| p.text.as_str()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_offsets_exact(text: &str, chunks: &[Chunk]) {
        for chunk in chunks {
            let slice = &text[chunk.start_index..chunk.start_index + chunk.content.len()];
            assert_eq!(slice, chunk.content);
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("hello world");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!(chunks[0].start_index, 0);
    }

    #[test]
    fn long_text_produces_overlapping_chunks() {
        // 2508 bytes of word-separated text: expect three chunks around
        // 1000/1000/500 sharing roughly 200 characters of overlap.
        let word = "lorem ipsum ";
        let text: String = word.repeat(209);
        let chunks = split_text(&text);

        assert_eq!(chunks.len(), 3, "got {} chunks", chunks.len());

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 1000);
        }

        assert!(chunks[0].content.chars().count() > 900);
        assert!(chunks[1].content.chars().count() > 900);

        // Consecutive chunks overlap: the next chunk starts before the
        // previous one ends, by no more than the overlap budget plus one
        // carried piece.
        for pair in chunks.windows(2) {
            let prev_end = pair[0].start_index + pair[0].content.len();
            assert!(pair[1].start_index < prev_end);
            assert!(prev_end - pair[1].start_index <= 200 + word.len());
        }

        assert_offsets_exact(&text, &chunks);
    }

    #[test]
    fn offsets_are_exact_even_for_repetitive_text() {
        let text = "paragraph one.\n\nparagraph two.\n\n".repeat(80);
        let chunks = split_text(&text);

        assert!(chunks.len() > 1);
        assert_offsets_exact(&text, &chunks);

        for pair in chunks.windows(2) {
            assert!(pair[0].start_index < pair[1].start_index);
        }
    }

    #[test]
    fn multibyte_text_keeps_byte_offsets_aligned() {
        let text = "héllo wörld çafé ".repeat(100);
        let chunks = split_text(&text);

        assert_offsets_exact(&text, &chunks);
    }

    #[test]
    fn paragraph_boundaries_are_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(400), "b".repeat(400));
        let chunks = split_text(&text);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.len(), 802);
    }

    #[test]
    fn giant_unbroken_token_still_splits() {
        let text = "x".repeat(2300);
        let chunks = split_text_with(&text, 1000, 200);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 1000);
        }
        assert_offsets_exact(&text, &chunks);
    }
}
