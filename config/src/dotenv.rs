//! Project `.env` reader for engine settings (`WEFT_*` tunables and
//! provider credentials such as `OPENAI_API_KEY`).
//!
//! This only parses the file into a map; precedence against the process
//! environment is decided in `load_and_apply`.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Reads `.env` from `dir` (or the current directory) into an ordered map.
/// A missing file reads as no overrides.
pub fn read(dir: Option<&Path>) -> io::Result<BTreeMap<String, String>> {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().filter_map(parse_line).collect())
}

/// One `KEY=VALUE` assignment. Blank lines, `#` comments, and lines without
/// `=` read as nothing; an `export ` prefix is accepted. A `#` inside a
/// value is part of the value.
fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim())))
}

/// Strips one layer of matching quotes. Double quotes honor `\"` escapes;
/// single quotes are literal.
fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        match (bytes[0], bytes[bytes.len() - 1]) {
            (b'"', b'"') => return value[1..value.len() - 1].replace("\\\"", "\""),
            (b'\'', b'\'') => return value[1..value.len() - 1].to_string(),
            _ => {}
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> BTreeMap<String, String> {
        content.lines().filter_map(parse_line).collect()
    }

    /// **Scenario**: Plain assignments and `export` assignments both parse;
    /// comments and malformed lines read as nothing.
    #[test]
    fn assignments_and_noise() {
        let map = parse(
            "# engine overrides\n\
             WEFT_MAX_NODES=200\n\
             export OPENAI_API_KEY=sk-test\n\
             not an assignment\n\
             =missing_key\n",
        );
        assert_eq!(map.get("WEFT_MAX_NODES").map(String::as_str), Some("200"));
        assert_eq!(map.get("OPENAI_API_KEY").map(String::as_str), Some("sk-test"));
        assert_eq!(map.len(), 2);
    }

    /// **Scenario**: Quoting: double quotes unescape `\"`, single quotes are
    /// literal, and an empty value stays empty.
    #[test]
    fn quoting_rules() {
        let map = parse(
            "A=\"two words\"\nB='kept \\\" raw'\nC=\"say \\\"hi\\\"\"\nD=\n",
        );
        assert_eq!(map.get("A").map(String::as_str), Some("two words"));
        assert_eq!(map.get("B").map(String::as_str), Some("kept \\\" raw"));
        assert_eq!(map.get("C").map(String::as_str), Some("say \"hi\""));
        assert_eq!(map.get("D").map(String::as_str), Some(""));
    }

    /// **Scenario**: A `#` inside a value is not a comment.
    #[test]
    fn hash_inside_value() {
        let map = parse("WEFT_NOTE=a#b\n");
        assert_eq!(map.get("WEFT_NOTE").map(String::as_str), Some("a#b"));
    }

    /// **Scenario**: Missing file reads as an empty map; a real file reads
    /// its assignments.
    #[test]
    fn read_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(Some(dir.path())).unwrap().is_empty());
        std::fs::write(dir.path().join(".env"), "WEFT_TOKEN_BUDGET=5000\n").unwrap();
        let map = read(Some(dir.path())).unwrap();
        assert_eq!(map.get("WEFT_TOKEN_BUDGET").map(String::as_str), Some("5000"));
    }
}
