//! Writer for the `.metadata` file that replaces the legacy meta file.
//!
//! The output is a small YAML document with a fixed key order:
//!
//! ```yaml
//! game: oot
//! metadata:
//!   display name: Song Title
//!   instrument set: 0x1C
//!   song type: bgm
//!   music groups: [Overworld, Town]
//!   audio samples:
//!     flute.zsound:
//!       instrument type: INST
//!       list index: 12
//!       key region: HIGH
//! ```

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::{InstrumentSet, MetaDescriptor, SoundDirective};
use crate::error::Result;

pub const GAME_ID: &str = "oot";
pub const METADATA_EXTENSION: &str = "metadata";

pub fn to_metadata_string(meta: &MetaDescriptor) -> String {
    let mut out = String::new();
    out.push_str(&format!("game: {GAME_ID}\n"));
    out.push_str("metadata:\n");
    out.push_str(&format!(
        "  display name: {}\n",
        scalar(&meta.display_name, false)
    ));
    match meta.instrument_set {
        InstrumentSet::Custom => out.push_str("  instrument set: custom\n"),
        InstrumentSet::Numeric(set) => out.push_str(&format!("  instrument set: 0x{set:X}\n")),
    }
    out.push_str(&format!("  song type: {}\n", meta.song_type.as_str()));

    let groups: Vec<Cow<'_, str>> = meta
        .groups
        .as_slice()
        .iter()
        .map(|group| scalar(group, true))
        .collect();
    out.push_str(&format!("  music groups: [{}]\n", groups.join(", ")));

    if !meta.directives.is_empty() {
        out.push_str("  audio samples:\n");
        for (id, directive) in meta.directives.iter() {
            out.push_str(&format!("    {}:\n", scalar(id, false)));
            match directive {
                SoundDirective::Resolved {
                    instrument_type,
                    list_index,
                    key_region,
                } => {
                    out.push_str(&format!(
                        "      instrument type: {}\n",
                        instrument_type.token()
                    ));
                    out.push_str(&format!("      list index: {list_index}\n"));
                    if let Some(region) = key_region {
                        out.push_str(&format!("      key region: {}\n", region.token()));
                    }
                }
                SoundDirective::Unresolved { temp_address } => {
                    out.push_str(&format!("      temp address: 0x{temp_address:X}\n"));
                }
            }
        }
    }
    out
}

/// Write `<stem>.metadata` into `dir` and return its path.
pub fn write_metadata(dir: &Path, stem: &str, meta: &MetaDescriptor) -> Result<PathBuf> {
    let path = dir.join(format!("{stem}.{METADATA_EXTENSION}"));
    fs::write(&path, to_metadata_string(meta))?;
    Ok(path)
}

/// Render a string so a YAML reader gets it back verbatim. `flow` marks
/// values inside `[...]`, where commas and brackets are significant.
fn scalar(text: &str, flow: bool) -> Cow<'_, str> {
    if text.chars().any(|c| (c.is_control() && c != '\t') || is_unicode_break(c)) {
        return Cow::Owned(double_quoted(text));
    }
    if needs_quotes(text, flow) {
        return Cow::Owned(format!("'{}'", text.replace('\'', "''")));
    }
    Cow::Borrowed(text)
}

fn needs_quotes(text: &str, flow: bool) -> bool {
    let Some(first) = text.chars().next() else {
        return true;
    };
    if first.is_whitespace() || text.ends_with(char::is_whitespace) || text.ends_with(':') {
        return true;
    }
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return true;
    }
    if text.contains(": ") || text.contains(" #") || text.contains('\t') {
        return true;
    }
    if flow && text.contains([',', '[', ']', '{', '}']) {
        return true;
    }
    looks_typed(text)
}

/// Plain scalars a YAML 1.1 reader would resolve to something other than a
/// string: bools, nulls, numbers, timestamps and the merge/value keys.
fn looks_typed(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "~" | "null"
            | "true"
            | "false"
            | "yes"
            | "no"
            | "on"
            | "off"
            | "y"
            | "n"
            | ".nan"
            | ".inf"
            | "+.inf"
            | "-.inf"
            | "<<"
            | "="
    ) {
        return true;
    }
    looks_numeric(text) || looks_like_date(text)
}

/// Covers decimal, octal, hex, binary, sexagesimal and float forms, with
/// `_` separators. Errs on the side of quoting.
fn looks_numeric(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let mut chars = body.chars();
    let starts_like_number = match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    starts_like_number
        && body
            .chars()
            .all(|c| c.is_ascii_hexdigit() || "_.:xXoObB+-".contains(c))
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn looks_like_date(text: &str) -> bool {
    let digits = |part: &str, min: usize, max: usize| {
        (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };
    let date = text.split([' ', '\t', 'T', 't']).next().unwrap_or(text);
    let mut parts = date.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    digits(year, 4, 4) && digits(month, 1, 2) && digits(day, 1, 2)
}

/// Line breaks outside the C0/C1 control ranges.
fn is_unicode_break(c: char) -> bool {
    matches!(c, '\u{2028}' | '\u{2029}')
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{85}' => out.push_str("\\N"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> String {
        to_metadata_string(&MetaDescriptor::parse(text).unwrap())
    }

    #[test]
    fn test_full_document() {
        let out = render(
            "Lost Woods\n1C\nbgm\nForest,Field\n\
             ZSOUND:INST:12:HIGH:flute.zsound\nZSOUND:harp.zsound:3A0",
        );
        assert_eq!(
            out,
            "game: oot\n\
             metadata:\n\
             \x20 display name: Lost Woods\n\
             \x20 instrument set: 0x1C\n\
             \x20 song type: bgm\n\
             \x20 music groups: [Forest, Field]\n\
             \x20 audio samples:\n\
             \x20   flute.zsound:\n\
             \x20     instrument type: INST\n\
             \x20     list index: 12\n\
             \x20     key region: HIGH\n\
             \x20   harp.zsound:\n\
             \x20     temp address: 0x3A0\n"
        );
    }

    #[test]
    fn test_custom_instrument_set_and_no_samples() {
        let out = render("Fairy Fountain\n-\nfanfare");
        assert!(out.contains("  instrument set: custom\n"));
        assert!(out.contains("  song type: fanfare\n"));
        assert!(out.contains("  music groups: [fanfare]\n"));
        assert!(!out.contains("audio samples"));
    }

    #[test]
    fn test_hex_is_uppercase() {
        let out = render("Song\nabcdef");
        assert!(out.contains("  instrument set: 0xABCDEF\n"));
    }

    #[test]
    fn test_resolved_without_region() {
        let mut meta = MetaDescriptor::parse("Song\n-").unwrap();
        meta.directives.insert(
            "boom".into(),
            SoundDirective::Resolved {
                instrument_type: crate::descriptor::InstType::Effect,
                list_index: 2,
                key_region: None,
            },
        );
        let out = to_metadata_string(&meta);
        assert!(out.ends_with("    boom:\n      instrument type: SFX\n      list index: 2\n"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let text = "Song\n7\nbgm\nA,B\nZSOUND:x:10\nZSOUND:DRUM:1:LOW:y";
        assert_eq!(render(text), render(text));
    }

    #[test]
    fn test_scalar_quoting() {
        assert_eq!(scalar("Zelda's Lullaby", false), "Zelda's Lullaby");
        assert_eq!(scalar("Boss: Phase 2", false), "'Boss: Phase 2'");
        assert_eq!(scalar("'quoted'", false), "'''quoted'''");
        assert_eq!(scalar("1984", false), "'1984'");
        assert_eq!(scalar("yes", false), "'yes'");
        assert_eq!(scalar("", false), "''");
        assert_eq!(scalar(" padded", false), "' padded'");
        assert_eq!(scalar("a,b", false), "a,b");
        assert_eq!(scalar("a,b", true), "'a,b'");
        assert_eq!(scalar("bell\u{7}", false), "\"bell\\x07\"");
        assert_eq!(scalar("12 Bar Blues", false), "12 Bar Blues");
        assert_eq!(scalar("1up", false), "1up");
    }

    #[test]
    fn test_scalar_quoting_yaml_typed_forms() {
        assert_eq!(scalar("1:30", false), "'1:30'");
        assert_eq!(scalar("-1:30:00", false), "'-1:30:00'");
        assert_eq!(scalar("1_000", true), "'1_000'");
        assert_eq!(scalar("0b1010", false), "'0b1010'");
        assert_eq!(scalar("0x1F", false), "'0x1F'");
        assert_eq!(scalar(".5", false), "'.5'");
        assert_eq!(scalar("-.INF", false), "'-.INF'");
        assert_eq!(scalar("2001-01-01", true), "'2001-01-01'");
        assert_eq!(scalar("2001-12-14t21:59:43.10-05:00", false), "'2001-12-14t21:59:43.10-05:00'");
        assert_eq!(scalar("2001-1-2 3:04:05", false), "'2001-1-2 3:04:05'");
        assert_eq!(scalar("<<", false), "'<<'");
        assert_eq!(scalar("=", false), "'='");
        assert_eq!(scalar("Null", false), "'Null'");
        assert_eq!(scalar("2001: A Space Odyssey", false), "'2001: A Space Odyssey'");
    }

    #[test]
    fn test_unicode_line_breaks_are_escaped() {
        assert_eq!(scalar("a\u{85}b", false), "\"a\\Nb\"");
        assert_eq!(scalar("a\u{2028}b", false), "\"a\\Lb\"");
        assert_eq!(scalar("a\u{2029}b", true), "\"a\\Pb\"");

        let mut meta = MetaDescriptor::parse("Song\n-\nbgm\n1:30,2001-01-01,1_000").unwrap();
        meta.display_name = "Intro\u{2028}Loop".into();
        let out = to_metadata_string(&meta);
        assert!(out.contains("  display name: \"Intro\\LLoop\"\n"));
        assert!(out.contains("  music groups: ['1:30', '2001-01-01', '1_000']\n"));
    }
}
