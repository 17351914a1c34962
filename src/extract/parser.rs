//! Parsing of `git log` records.
//!
//! Each commit is emitted as one record starting with [`RECORD_SEPARATOR`].
//! Inside a record, fields are split by [`FIELD_SEPARATOR`]: hash, author
//! name, author email, committer timestamp, raw message, and finally the
//! `--name-only` file list, one path per line.
//!
//! Commit messages may themselves contain the record separator, so a
//! separator only opens a new record when [`starts_record`] accepts what
//! follows it.

use super::error::ExtractError;
use super::source::RawCommit;

/// ASCII record separator, starts every commit
pub const RECORD_SEPARATOR: u8 = 0x1e;

/// ASCII unit separator, between fields of a commit
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// `--format` argument matching [`parse_record`]
pub const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ae%x1f%ct%x1f%B%x1f";

/// Whether the bytes after a record separator open a new commit: a full
/// SHA-1 or SHA-256 object id directly followed by the field separator.
pub fn starts_record(chunk: &[u8]) -> bool {
    let Some(end) = chunk
        .iter()
        .take(65)
        .position(|&b| b == FIELD_SEPARATOR as u8)
    else {
        return false;
    };
    matches!(end, 40 | 64) && chunk[..end].iter().all(u8::is_ascii_hexdigit)
}

/// Parse one record (separator already stripped).
///
/// Returns `Ok(None)` for blank input, which git emits before the first record.
pub fn parse_record(record: &[u8]) -> Result<Option<RawCommit>, ExtractError> {
    let text = String::from_utf8_lossy(record);
    if text.trim().is_empty() {
        return Ok(None);
    }

    let mut head = text.splitn(5, FIELD_SEPARATOR);
    let (Some(hash), Some(author_name), Some(author_email), Some(timestamp), Some(rest)) = (
        head.next(),
        head.next(),
        head.next(),
        head.next(),
        head.next(),
    ) else {
        return Err(malformed(&text, "missing fields"));
    };

    // The message may span lines; the file list follows the last separator
    let (message, files) = rest
        .rsplit_once(FIELD_SEPARATOR)
        .ok_or_else(|| malformed(&text, "missing file list"))?;

    let hash = hash.trim();
    if hash.is_empty() {
        return Err(malformed(&text, "empty hash"));
    }

    let timestamp = timestamp
        .trim()
        .parse::<i64>()
        .map_err(|_| malformed(&text, "bad timestamp"))?;

    let files = files
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    Ok(Some(RawCommit {
        hash: hash.to_string(),
        author_name: author_name.to_string(),
        author_email: author_email.to_string(),
        timestamp,
        message: message.to_string(),
        files,
    }))
}

fn malformed(text: &str, reason: &str) -> ExtractError {
    let preview: String = text.chars().take(60).collect();
    ExtractError::MalformedRecord(format!("{}: {:?}", reason, preview))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> Vec<u8> {
        fields.join("\u{1f}").into_bytes()
    }

    #[test]
    fn test_parse_full_record() {
        let raw = record(&[
            "abc123",
            "Ada Lovelace",
            "a@x.com",
            "1700000000",
            "feat: add login\n\nWires up Auth0.\n",
            "\n\nsrc/auth.rs\nsrc/main.rs\n",
        ]);

        let commit = parse_record(&raw).unwrap().unwrap();
        assert_eq!(commit.hash, "abc123");
        assert_eq!(commit.author_name, "Ada Lovelace");
        assert_eq!(commit.author_email, "a@x.com");
        assert_eq!(commit.timestamp, 1_700_000_000);
        assert_eq!(commit.message, "feat: add login\n\nWires up Auth0.\n");
        assert_eq!(commit.files, vec!["src/auth.rs", "src/main.rs"]);
    }

    #[test]
    fn test_merge_commit_without_files() {
        let raw = record(&["def456", "Bob", "b@y.com", "1700000100", "Merge branch 'x'\n", "\n"]);
        let commit = parse_record(&raw).unwrap().unwrap();
        assert!(commit.files.is_empty());
    }

    #[test]
    fn test_empty_email_is_kept() {
        let raw = record(&["0a1b", "bot", "", "1", "chore\n", ""]);
        let commit = parse_record(&raw).unwrap().unwrap();
        assert_eq!(commit.author_email, "");
    }

    #[test]
    fn test_blank_record_is_skipped() {
        assert!(parse_record(b"").unwrap().is_none());
        assert!(parse_record(b"\n").unwrap().is_none());
    }

    #[test]
    fn test_starts_record() {
        let sha1 = "a".repeat(40);
        assert!(starts_record(format!("{}\u{1f}Ada\u{1f}", sha1).as_bytes()));
        assert!(starts_record(format!("{}\u{1f}", "0f".repeat(32)).as_bytes()));

        // Text after a separator embedded in a message
        assert!(!starts_record(b"not a hash\x1fstill message"));
        assert!(!starts_record(b"abc123\x1fAda"));
        assert!(!starts_record(format!("{}\u{1f}", "g".repeat(40)).as_bytes()));
        assert!(!starts_record(b""));
    }

    #[test]
    fn test_malformed_records() {
        let err = parse_record(b"abc123\x1fAda").unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRecord(_)));

        let raw = record(&["abc", "Ada", "a@x.com", "yesterday", "msg", ""]);
        let err = parse_record(&raw).unwrap_err();
        assert!(err.to_string().contains("bad timestamp"));
    }
}
