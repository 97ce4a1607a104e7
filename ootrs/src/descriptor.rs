//! Legacy `.meta` descriptor model and parser.
//!
//! A legacy meta file is positional:
//!
//! ```text
//! Song Title            <- display name (required)
//! 28                    <- instrument set, hex, or `-` for a custom bank (required)
//! bgm                   <- song type (optional, defaults to bgm)
//! Overworld,Town        <- music groups (optional, defaults by song type)
//! ZSOUND:INST:3:PRIM:a  <- sound directives (optional, any number)
//! ```
//!
//! Directives come in two generations. The newer one names the bank slot a
//! sound replaces (`ZSOUND:type:index:region:id`); the older one only records
//! the raw sample address (`ZSOUND:id:hex_address`) and must be resolved
//! against the archive's sound bank before it is meaningful.

use log::warn;

use crate::error::{OotrsError, Result};

pub const DIRECTIVE_KEYWORD: &str = "ZSOUND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SongType {
    #[default]
    Bgm,
    Fanfare,
}

impl SongType {
    /// Case-insensitive match against the known song type words.
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "bgm" => Some(Self::Bgm),
            "fanfare" => Some(Self::Fanfare),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bgm => "bgm",
            Self::Fanfare => "fanfare",
        }
    }

    /// Groups assigned when the meta file does not list any.
    pub fn default_groups(self) -> &'static [&'static str] {
        match self {
            Self::Bgm => &["bgm"],
            Self::Fanfare => &["fanfare"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentSet {
    Custom,
    Numeric(u32),
}

/// Ordered, non-empty list of category tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicGroups(Vec<String>);

impl MusicGroups {
    pub fn defaults(song_type: SongType) -> Self {
        Self(
            song_type
                .default_groups()
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
    }

    /// Split a comma-separated tag line. Returns `None` when no tag survives
    /// trimming.
    pub fn from_line(line: &str) -> Option<Self> {
        let tags: Vec<String> = line
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect();
        (!tags.is_empty()).then_some(Self(tags))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Which bank table a sound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstType {
    Instrument,
    Drum,
    Effect,
}

impl InstType {
    /// Case-insensitive match against `INST`, `DRUM` and `SFX`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "INST" => Some(Self::Instrument),
            "DRUM" => Some(Self::Drum),
            "SFX" => Some(Self::Effect),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Instrument => "INST",
            Self::Drum => "DRUM",
            Self::Effect => "SFX",
        }
    }
}

/// Pitch range of an instrument tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRegion {
    Low,
    Primary,
    High,
}

impl KeyRegion {
    /// Unknown tokens fall back to [`KeyRegion::Primary`].
    pub fn from_token_lossy(token: &str) -> Self {
        match token {
            "LOW" => Self::Low,
            "HIGH" => Self::High,
            _ => Self::Primary,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Primary => "PRIM",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundDirective {
    Resolved {
        instrument_type: InstType,
        list_index: u32,
        key_region: Option<KeyRegion>,
    },
    Unresolved {
        temp_address: u32,
    },
}

/// Sound directives keyed by sound id, in first-seen order.
///
/// Inserting an id that already exists replaces its directive but keeps the
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives(Vec<(String, SoundDirective)>);

impl Directives {
    pub fn insert(&mut self, id: String, directive: SoundDirective) {
        if let Some(slot) = self.0.iter_mut().find(|(existing, _)| *existing == id) {
            slot.1 = directive;
        } else {
            self.0.push((id, directive));
        }
    }

    pub fn get(&self, id: &str) -> Option<&SoundDirective> {
        self.0
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, directive)| directive)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SoundDirective)> {
        self.0.iter().map(|(id, directive)| (id.as_str(), directive))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SoundDirective)> {
        self.0
            .iter_mut()
            .map(|(id, directive)| (id.as_str(), directive))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDescriptor {
    pub display_name: String,
    pub instrument_set: InstrumentSet,
    pub song_type: SongType,
    pub groups: MusicGroups,
    pub directives: Directives,
}

impl MetaDescriptor {
    /// Parse the contents of a legacy meta file.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();

        let display_name = lines
            .first()
            .ok_or_else(|| OotrsError::parse(1, "missing display name"))?
            .to_string();

        let instrument_set = parse_instrument_set(
            lines
                .get(1)
                .ok_or_else(|| OotrsError::parse(2, "missing instrument set"))?,
        )?;

        let song_type = match lines.get(2).map(|line| line.trim()) {
            None | Some("") => SongType::Bgm,
            Some(text) => SongType::from_text(text).unwrap_or_else(|| {
                warn!("unknown song type {text:?}, treating as bgm");
                SongType::Bgm
            }),
        };

        let groups = lines
            .get(3)
            .and_then(|line| MusicGroups::from_line(line))
            .unwrap_or_else(|| MusicGroups::defaults(song_type));

        let mut directives = Directives::default();
        for (i, line) in lines.iter().enumerate().skip(4) {
            if let Some((id, directive)) = parse_directive(i + 1, line)? {
                directives.insert(id, directive);
            }
        }

        Ok(Self {
            display_name,
            instrument_set,
            song_type,
            groups,
            directives,
        })
    }

    pub fn has_unresolved(&self) -> bool {
        self.directives
            .iter()
            .any(|(_, directive)| matches!(directive, SoundDirective::Unresolved { .. }))
    }
}

fn parse_instrument_set(line: &str) -> Result<InstrumentSet> {
    let line = line.trim();
    if line == "-" {
        return Ok(InstrumentSet::Custom);
    }
    // Older tools wrote the song type here and shifted every later field.
    if SongType::from_text(line).is_some() {
        return Err(OotrsError::parse(
            2,
            format!("instrument set {line:?} is a song type; fields are shifted"),
        ));
    }
    parse_hex(line)
        .map(InstrumentSet::Numeric)
        .ok_or_else(|| OotrsError::parse(2, format!("invalid hex instrument set {line:?}")))
}

fn parse_directive(line_no: usize, line: &str) -> Result<Option<(String, SoundDirective)>> {
    let tokens: Vec<&str> = line.split(':').collect();
    if tokens[0] != DIRECTIVE_KEYWORD {
        return Ok(None);
    }
    if let Some(entry) = parse_new_directive(line_no, &tokens)? {
        return Ok(Some(entry));
    }
    parse_old_directive(&tokens)
        .map(Some)
        .ok_or_else(|| OotrsError::parse(line_no, format!("malformed sound directive {line:?}")))
}

/// `ZSOUND:type:index:region:id`
///
/// Returns `None` when the line lacks the fields or the decimal index of this
/// form. A line that has both but names an unknown type is an error.
fn parse_new_directive(line_no: usize, tokens: &[&str]) -> Result<Option<(String, SoundDirective)>> {
    let [_, kind, index, region, id, ..] = tokens else {
        return Ok(None);
    };
    let Ok(list_index) = index.trim().parse() else {
        return Ok(None);
    };
    let instrument_type = InstType::from_token(kind)
        .ok_or_else(|| OotrsError::parse(line_no, format!("unknown instrument type {kind:?}")))?;
    let directive = SoundDirective::Resolved {
        instrument_type,
        list_index,
        key_region: Some(KeyRegion::from_token_lossy(region)),
    };
    Ok(Some(((*id).to_string(), directive)))
}

/// `ZSOUND:id:hex_address`
fn parse_old_directive(tokens: &[&str]) -> Option<(String, SoundDirective)> {
    let [_, id, address, ..] = tokens else {
        return None;
    };
    let temp_address = parse_hex(address)?;
    Some(((*id).to_string(), SoundDirective::Unresolved { temp_address }))
}

pub(crate) fn parse_hex(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}
