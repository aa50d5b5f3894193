//! 🎼 The Line Codec: turns verbs and arguments into protocol-safe command lines.
//!
//! ```text
//!   text ──escape──▶ escaped ──split_text(L)──▶ [chunk, chunk, ..] ──wrap──▶
//!   PUSH <collection> <bucket> <object> "<chunk>"   (one line per chunk)
//! ```
//!
//! 🧠 Knowledge graph:
//! - Escaping order is backslash, newline, quote. Backslash goes first so the
//!   backslashes we add later don't get doubled up.
//! - `L` (the chunk budget) is half the service's max command size. The other half
//!   is reserved for the verb, the namespace and the quotes.
//! - Chunk boundaries never land inside a UTF-8 sequence, and never between a
//!   backslash and the character it escapes. Every chunk is a valid string on its own.
//! - Zero-copy where possible: text with nothing to escape comes back as `Cow::Borrowed`,
//!   and chunks are `&str` slices of the escaped text. 🐄

use std::borrow::Cow;

use memchr::memchr3;

use crate::errors::IngestError;

/// 📏 Smallest chunk budget we accept. A 4-byte UTF-8 character has to fit somewhere.
pub const MIN_CHUNK_BYTES: usize = 4;

/// 📏 Max command size assumed when the service doesn't advertise one during START.
pub const DEFAULT_MAX_COMMAND_BYTES: usize = 20_000;

/// 🔤 Ingest channel verbs. Case-sensitive on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Push,
    Pop,
    Count,
    FlushCollection,
    FlushBucket,
    FlushObject,
    Ping,
    Quit,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Push => "PUSH",
            Verb::Pop => "POP",
            Verb::Count => "COUNT",
            Verb::FlushCollection => "FLUSHC",
            Verb::FlushBucket => "FLUSHB",
            Verb::FlushObject => "FLUSHO",
            Verb::Ping => "PING",
            Verb::Quit => "QUIT",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 🛡️ Escape backslash, newline and double-quote so the text survives inside `"..."`.
///
/// Each reserved character gains exactly one extra backslash. Text with nothing to
/// escape is returned borrowed.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = memchr3(b'\\', b'\n', b'"', bytes) else {
        return Cow::Borrowed(text);
    };

    let mut escaped = String::with_capacity(text.len() + 8);
    escaped.push_str(&text[..first]);
    for ch in text[first..].chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// 🔄 Reverse of [`escape_text`]. A trailing lone backslash or an unknown escape is kept as-is.
pub fn unescape_text(escaped: &str) -> Cow<'_, str> {
    if memchr::memchr(b'\\', escaped.as_bytes()).is_none() {
        return Cow::Borrowed(escaped);
    }

    let mut text = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => text.push('\\'),
            Some('n') => text.push('\n'),
            Some('"') => text.push('"'),
            Some(other) => {
                text.push('\\');
                text.push(other);
            }
            None => text.push('\\'),
        }
    }
    Cow::Owned(text)
}

/// ✂️ Split escaped text into consecutive chunks of at most `max_len` bytes.
///
/// A candidate split point walks backward until it sits on a char boundary, then one
/// more byte if the chunk would end in an odd run of backslashes (the tail of an
/// unfinished escape). Empty input still yields exactly one (empty) chunk.
pub fn split_text(text: &str, max_len: usize) -> Vec<&str> {
    let max_len = max_len.max(MIN_CHUNK_BYTES);
    let bytes = text.as_bytes();
    let mut chunks = Vec::with_capacity(text.len() / max_len + 1);

    let mut start = 0;
    while text.len() - start > max_len {
        let mut end = start + max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let trailing_backslashes = bytes[start..end]
            .iter()
            .rev()
            .take_while(|&&b| b == b'\\')
            .count();
        if trailing_backslashes % 2 == 1 && end - 1 > start {
            end -= 1;
        }
        chunks.push(&text[start..end]);
        start = end;
    }
    chunks.push(&text[start..]);
    chunks
}

/// 📏 The per-line payload budget for a service that accepts `max_command_bytes` per command.
pub fn chunk_budget(max_command_bytes: usize) -> usize {
    (max_command_bytes / 2).max(MIN_CHUNK_BYTES)
}

/// 🪪 Names are bare tokens on the wire: non-empty, no whitespace, no control characters.
pub fn validate_name(what: &'static str, name: &str) -> Result<(), IngestError> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.bytes().any(|b| b.is_ascii_whitespace()) {
        "must not contain whitespace"
    } else if name.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(IngestError::InvalidName {
        what,
        name: name.to_string(),
        reason,
    })
}

const NAMESPACE: [&str; 3] = ["collection", "bucket", "object"];

/// 🧱 `VERB collection [bucket [object]]`, every name checked before it joins the line.
fn command_head(verb: Verb, namespace: &[&str]) -> Result<String, IngestError> {
    let mut line = String::from(verb.as_str());
    for (what, name) in NAMESPACE.into_iter().zip(namespace) {
        validate_name(what, name)?;
        line.push(' ');
        line.push_str(name);
    }
    Ok(line)
}

/// 🧱 Append ` "payload"` to a command head.
fn text_command(head: &str, payload: &str) -> String {
    let mut line = String::with_capacity(head.len() + payload.len() + 3);
    line.push_str(head);
    line.push_str(" \"");
    line.push_str(payload);
    line.push('"');
    line
}

/// 📥 Encode one PUSH into one or more command lines, one per chunk of the escaped text.
pub fn encode_push(
    collection: &str,
    bucket: &str,
    object: &str,
    text: &str,
    max_command_bytes: usize,
) -> Result<Vec<String>, IngestError> {
    let head = command_head(Verb::Push, &[collection, bucket, object])?;
    let escaped = escape_text(text);
    Ok(split_text(&escaped, chunk_budget(max_command_bytes))
        .into_iter()
        .map(|chunk| text_command(&head, chunk))
        .collect())
}

/// 🗑️ Encode one POP. Escaped like a push, but always a single line.
pub fn encode_pop(
    collection: &str,
    bucket: &str,
    object: &str,
    text: &str,
) -> Result<String, IngestError> {
    let head = command_head(Verb::Pop, &[collection, bucket, object])?;
    Ok(text_command(&head, &escape_text(text)))
}

/// 🔢 `COUNT <collection> [<bucket> [<object>]]`. An object without a bucket is dropped.
pub fn encode_count(
    collection: &str,
    bucket: Option<&str>,
    object: Option<&str>,
) -> Result<String, IngestError> {
    let bucket = bucket.filter(|b| !b.is_empty());
    let object = object.filter(|o| !o.is_empty() && bucket.is_some());
    let namespace: Vec<&str> = std::iter::once(collection)
        .chain(bucket)
        .chain(object)
        .collect();
    command_head(Verb::Count, &namespace)
}

/// 🧹 `FLUSHC` / `FLUSHB` / `FLUSHO` followed by however much namespace the verb needs.
pub fn encode_flush(verb: Verb, namespace: &[&str]) -> Result<String, IngestError> {
    command_head(verb, namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_reserved_characters_each_gain_one_backslash() {
        assert_eq!(escape_text("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_text("\"hi\""), "\\\"hi\\\"");
        assert_eq!(escape_text("C:\\temp"), "C:\\\\temp");

        let all_three = "a\\b\nc\"d";
        assert_eq!(escape_text(all_three).len(), all_three.len() + 3);
    }

    #[test]
    fn the_one_where_backslash_goes_first_so_nothing_is_double_escaped() {
        // 🧪 an already-escaped-looking newline stays distinguishable from a real one
        assert_eq!(escape_text("\\n"), "\\\\n");
        assert_eq!(escape_text("\n"), "\\n");
        assert_eq!(unescape_text(&escape_text("\\n")), "\\n");
    }

    #[test]
    fn the_one_where_clean_text_is_not_copied() {
        assert!(matches!(escape_text("plain old words"), Cow::Borrowed(_)));
        assert!(matches!(unescape_text("plain old words"), Cow::Borrowed(_)));
    }

    #[test]
    fn the_one_where_unescape_reverses_escape() {
        for original in ["", "x", "tab\there", "\"quoted\" \\ slashed \n newline", "naïve 🦆 \\\"\n"] {
            assert_eq!(unescape_text(&escape_text(original)), original);
        }
    }

    #[test]
    fn the_one_where_two_l_plus_five_makes_three_chunks() {
        let budget = 10;
        let text = "a".repeat(2 * budget + 5);
        let chunks = split_text(&text, budget);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), budget);
        assert_eq!(chunks[1].len(), budget);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn the_one_where_empty_text_still_gets_one_chunk() {
        assert_eq!(split_text("", 10), vec![""]);
        let lines = encode_push("messages", "user:1", "conversation:1", "", 100)
            .expect("💀 valid names should encode");
        assert_eq!(lines, vec!["PUSH messages user:1 conversation:1 \"\"".to_string()]);
    }

    #[test]
    fn the_one_where_exact_fit_is_a_single_chunk() {
        let text = "b".repeat(10);
        assert_eq!(split_text(&text, 10), vec![text.as_str()]);
    }

    #[test]
    fn the_one_where_multibyte_characters_are_never_cut() {
        // 🧪 "é" is 2 bytes, "🦆" is 4 bytes: every budget must produce valid slices
        let text = "aé🦆bé🦆🦆c".repeat(7);
        for budget in MIN_CHUNK_BYTES..=13 {
            let chunks = split_text(&text, budget);
            assert!(chunks.iter().all(|c| c.len() <= budget));
            assert!(chunks.iter().all(|c| !c.is_empty()));
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn the_one_where_a_boundary_walks_back_to_the_char_start() {
        // 🧪 "aaa" + 4-byte duck: budget 5 would cut the duck, so the first chunk is "aaa"
        let chunks = split_text("aaa🦆", 5);
        assert_eq!(chunks, vec!["aaa", "🦆"]);
    }

    #[test]
    fn the_one_where_an_escape_pair_is_never_split() {
        // 🧪 escaped "aaa\n" is `aaa\n` (5 bytes); budget 4 would end on the lone backslash
        let escaped = escape_text("aaa\n");
        let chunks = split_text(&escaped, 4);
        assert_eq!(chunks, vec!["aaa", "\\n"]);

        // 🧪 an even run of backslashes is a complete escape and may end a chunk
        let escaped = escape_text("aa\\b");
        let chunks = split_text(&escaped, 4);
        assert_eq!(chunks, vec!["aa\\\\", "b"]);
    }

    #[test]
    fn the_one_where_every_chunk_rejoins_into_the_original_text() {
        let original = "He said \"hello\"\nthen C:\\dir\\file ü naïve café 🦆🦆 ".repeat(40);
        let escaped = escape_text(&original);
        for budget in [4, 5, 7, 16, 33, 100, 10_000] {
            let chunks = split_text(&escaped, budget);
            let rejoined: String = chunks.iter().map(|c| unescape_text(c)).collect();
            assert_eq!(rejoined, original, "budget {budget} lost data");
        }
    }

    #[test]
    fn the_one_where_push_lines_are_wrapped_per_chunk() {
        let lines = encode_push("messages", "default", "obj:1", "abcdefghij", 10)
            .expect("💀 valid names should encode");
        // 🧪 max command 10 bytes → budget 5 → two chunks
        assert_eq!(
            lines,
            vec![
                "PUSH messages default obj:1 \"abcde\"".to_string(),
                "PUSH messages default obj:1 \"fghij\"".to_string(),
            ]
        );
    }

    #[test]
    fn the_one_where_pop_is_escaped_but_never_chunked() {
        let text = "x\"".repeat(50);
        let line = encode_pop("messages", "default", "obj:1", &text)
            .expect("💀 valid names should encode");
        assert!(line.starts_with("POP messages default obj:1 \""));
        assert_eq!(line.matches("\\\"").count(), 50);
    }

    #[test]
    fn the_one_where_count_skips_an_orphan_object() {
        let count = |b, o| encode_count("c", b, o).expect("💀 valid names should encode");
        assert_eq!(count(None, None), "COUNT c");
        assert_eq!(count(Some("b"), None), "COUNT c b");
        assert_eq!(count(Some("b"), Some("o")), "COUNT c b o");
        assert_eq!(count(None, Some("o")), "COUNT c");
        assert_eq!(count(Some(""), Some("o")), "COUNT c");
    }

    #[test]
    fn the_one_where_flush_verbs_carry_their_namespace() {
        let flush = |verb, ns: &[&str]| encode_flush(verb, ns).expect("💀 valid names should encode");
        assert_eq!(flush(Verb::FlushCollection, &["c"]), "FLUSHC c");
        assert_eq!(flush(Verb::FlushBucket, &["c", "b"]), "FLUSHB c b");
        assert_eq!(flush(Verb::FlushObject, &["c", "b", "o"]), "FLUSHO c b o");
    }

    #[test]
    fn the_one_where_a_newline_in_an_object_cannot_smuggle_a_command() {
        let err = encode_push("c", "b", "A\r\nFLUSHC c", "t", 100)
            .expect_err("💀 a line break in a name must not reach the wire");
        assert!(matches!(
            err,
            IngestError::InvalidName { what: "object", reason: "must not contain whitespace", .. }
        ));
        assert!(encode_pop("c", "b", "X\nPING", "t").is_err());
    }

    #[test]
    fn the_one_where_a_space_would_shift_the_tokens() {
        assert!(matches!(
            encode_push("c", "my bucket", "o", "t", 100),
            Err(IngestError::InvalidName { what: "bucket", .. })
        ));
        assert!(matches!(
            encode_flush(Verb::FlushCollection, &["c c"]),
            Err(IngestError::InvalidName { what: "collection", .. })
        ));
        assert!(encode_count("c", Some("b"), Some("o\to")).is_err());
    }

    #[test]
    fn the_one_where_an_empty_object_is_not_a_name() {
        assert!(matches!(
            encode_push("c", "b", "", "t", 100),
            Err(IngestError::InvalidName { what: "object", reason: "must not be empty", .. })
        ));
        assert!(encode_pop("", "b", "o", "t").is_err());
    }

    #[test]
    fn the_one_where_control_bytes_are_refused_too() {
        assert!(matches!(
            validate_name("object", "obj\u{7}"),
            Err(IngestError::InvalidName { reason: "must not contain control characters", .. })
        ));
        assert!(validate_name("object", "conversation:🦆").is_ok());
    }

    #[test]
    fn the_one_where_the_budget_is_half_the_command_size() {
        assert_eq!(chunk_budget(DEFAULT_MAX_COMMAND_BYTES), 10_000);
        assert_eq!(chunk_budget(2), MIN_CHUNK_BYTES);
    }
}
