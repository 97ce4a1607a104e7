//! Sound bank (`.zbank` + `.bankmeta`) decoder.
//!
//! The bank meta is 8 bytes:
//!
//! | Offset | Size | Field            |
//! |--------|------|------------------|
//! | 0      | 1    | sample medium    |
//! | 1      | 1    | sequence player  |
//! | 2      | 1    | sample table id  |
//! | 3      | 1    | font id          |
//! | 4      | 1    | instrument count |
//! | 5      | 1    | drum count       |
//! | 6      | 2    | effect count     |
//!
//! The bank itself is a big-endian offset graph. Words 0 and 1 point at the
//! drum and effect lists, the instrument list starts at `0x8`. Every list
//! entry points at a record which in turn points at sample headers; the
//! sample's address is the second word of its header. A zero offset anywhere
//! marks an empty slot.

use crate::descriptor::{InstType, KeyRegion};
use crate::error::{OotrsError, Result};

pub const BANK_META_LEN: usize = 8;

const INSTRUMENT_LIST_OFFSET: usize = 0x8;
const INSTRUMENT_LOW_SAMPLE: usize = 8;
const INSTRUMENT_PRIM_SAMPLE: usize = 16;
const INSTRUMENT_HIGH_SAMPLE: usize = 24;
const DRUM_SAMPLE: usize = 4;
const EFFECT_STRIDE: usize = 8;
const SAMPLE_ADDRESS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankMeta {
    pub sample_medium: u8,
    pub seq_player: u8,
    pub table_id: u8,
    pub font_id: u8,
    pub instrument_count: u8,
    pub drum_count: u8,
    pub effect_count: u16,
}

impl BankMeta {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let Ok(bytes) = <&[u8; BANK_META_LEN]>::try_from(bytes) else {
            return Err(OotrsError::Malformed(format!(
                "bank meta must be {BANK_META_LEN} bytes, got {}",
                bytes.len()
            )));
        };
        Ok(Self {
            sample_medium: bytes[0],
            seq_player: bytes[1],
            table_id: bytes[2],
            font_id: bytes[3],
            instrument_count: bytes[4],
            drum_count: bytes[5],
            effect_count: u16::from_be_bytes([bytes[6], bytes[7]]),
        })
    }
}

/// The bank entry a sample is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOwner {
    Instrument { index: u32, key_region: KeyRegion },
    Drum { index: u32 },
    Effect { index: u32 },
}

impl SampleOwner {
    pub fn instrument_type(self) -> InstType {
        match self {
            Self::Instrument { .. } => InstType::Instrument,
            Self::Drum { .. } => InstType::Drum,
            Self::Effect { .. } => InstType::Effect,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            Self::Instrument { index, .. } | Self::Drum { index } | Self::Effect { index } => index,
        }
    }

    /// Only instrument samples have a key region.
    pub fn key_region(self) -> Option<KeyRegion> {
        match self {
            Self::Instrument { key_region, .. } => Some(key_region),
            Self::Drum { .. } | Self::Effect { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub owner: SampleOwner,
    pub address: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub index: u32,
    pub low: Option<Sample>,
    pub primary: Option<Sample>,
    pub high: Option<Sample>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drum {
    pub index: u32,
    pub sample: Option<Sample>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub index: u32,
    pub sample: Option<Sample>,
}

/// Decoded bank tables. Slots are `None` where the bank has no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBank {
    pub meta: BankMeta,
    pub instruments: Vec<Option<Instrument>>,
    pub drums: Vec<Option<Drum>>,
    pub effects: Vec<Option<Effect>>,
}

impl SoundBank {
    pub fn decode(meta_bytes: &[u8], bank_bytes: &[u8]) -> Result<Self> {
        let meta = BankMeta::parse(meta_bytes)?;
        let reader = BankReader(bank_bytes);

        let instruments = (0..u32::from(meta.instrument_count))
            .map(|index| {
                let entry = INSTRUMENT_LIST_OFFSET + 4 * index as usize;
                match reader.offset_at(entry)? {
                    0 => Ok(None),
                    record => reader.instrument(index, record).map(Some),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let drum_list = reader.offset_at(0)?;
        let drums = (0..u32::from(meta.drum_count))
            .map(|index| {
                if drum_list == 0 {
                    return Ok(None);
                }
                match reader.offset_at(offset_add(drum_list, 4 * index as usize)?)? {
                    0 => Ok(None),
                    record => {
                        let pointer = offset_add(record, DRUM_SAMPLE)?;
                        let sample = reader.sample_at(pointer, SampleOwner::Drum { index })?;
                        Ok(Some(Drum { index, sample }))
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let effect_list = reader.offset_at(4)?;
        let effects = (0..u32::from(meta.effect_count))
            .map(|index| {
                if effect_list == 0 {
                    return Ok(None);
                }
                // Effect entries are inline records: the entry itself holds the sample pointer.
                let stride = EFFECT_STRIDE
                    .checked_mul(index as usize)
                    .ok_or_else(|| OotrsError::Malformed(format!("effect {index} is out of range")))?;
                let entry = offset_add(effect_list, stride)?;
                let sample = reader.sample_at(entry, SampleOwner::Effect { index })?;
                Ok(Some(Effect { index, sample }))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            meta,
            instruments,
            drums,
            effects,
        })
    }

    /// Every sample in the bank: instruments (low, primary, high), then
    /// drums, then effects, each in slot order.
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        let instruments = self
            .instruments
            .iter()
            .flatten()
            .flat_map(|inst| [&inst.low, &inst.primary, &inst.high])
            .flatten();
        let drums = self.drums.iter().flatten().filter_map(|drum| drum.sample.as_ref());
        let effects = self
            .effects
            .iter()
            .flatten()
            .filter_map(|effect| effect.sample.as_ref());
        instruments.chain(drums).chain(effects)
    }
}

struct BankReader<'a>(&'a [u8]);

impl BankReader<'_> {
    fn word(&self, offset: usize) -> Result<u32> {
        offset
            .checked_add(4)
            .and_then(|end| self.0.get(offset..end))
            .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .ok_or_else(|| {
                OotrsError::Malformed(format!(
                    "offset {offset:#X} is outside the {} byte bank",
                    self.0.len()
                ))
            })
    }

    fn offset_at(&self, offset: usize) -> Result<usize> {
        self.word(offset).map(|word| word as usize)
    }

    fn instrument(&self, index: u32, record: usize) -> Result<Instrument> {
        let region = |key_region| SampleOwner::Instrument { index, key_region };
        Ok(Instrument {
            index,
            low: self.sample_at(offset_add(record, INSTRUMENT_LOW_SAMPLE)?, region(KeyRegion::Low))?,
            primary: self.sample_at(
                offset_add(record, INSTRUMENT_PRIM_SAMPLE)?,
                region(KeyRegion::Primary),
            )?,
            high: self.sample_at(offset_add(record, INSTRUMENT_HIGH_SAMPLE)?, region(KeyRegion::High))?,
        })
    }

    /// Follow the sample pointer stored at `pointer`.
    fn sample_at(&self, pointer: usize, owner: SampleOwner) -> Result<Option<Sample>> {
        match self.offset_at(pointer)? {
            0 => Ok(None),
            header => Ok(Some(Sample {
                owner,
                address: self.word(offset_add(header, SAMPLE_ADDRESS)?)?,
            })),
        }
    }
}

/// Offsets come from the file, so additions on them must not wrap.
fn offset_add(base: usize, delta: usize) -> Result<usize> {
    base.checked_add(delta)
        .ok_or_else(|| OotrsError::Malformed(format!("offset {base:#X} + {delta:#X} overflows")))
}
