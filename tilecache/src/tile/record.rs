//! Tile records and payload variants.

use crate::coord::TileCoord;
use std::fmt;
use std::str::FromStr;

/// Which of the two payload slots a tile operation targets.
///
/// The imagery service publishes each tile twice: a bare image and the same
/// image with labels (place names, roads) rendered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileVariant {
    /// Imagery without labels
    Plain,
    /// Imagery with labels
    Labeled,
}

impl TileVariant {
    /// Both variants, in chain order.
    pub const ALL: [TileVariant; 2] = [TileVariant::Plain, TileVariant::Labeled];

    /// Name of the store column holding this variant's payload.
    pub fn column(&self) -> &'static str {
        match self {
            TileVariant::Plain => "plain_payload",
            TileVariant::Labeled => "labeled_payload",
        }
    }

    /// Short lowercase name for logs and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileVariant::Plain => "plain",
            TileVariant::Labeled => "labeled",
        }
    }
}

impl fmt::Display for TileVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(TileVariant::Plain),
            "labeled" | "labelled" => Ok(TileVariant::Labeled),
            other => Err(format!("unknown tile variant '{}'", other)),
        }
    }
}

/// How much of a tile has been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Coordinate is known to be in scope but nothing has been fetched
    Placeholder,
    /// Exactly one variant is present
    Partial,
    /// Both variants are present
    Complete,
}

/// One row of the tile store.
///
/// An empty payload is treated exactly like an absent one: the store only
/// ever fills a slot that is NULL or zero-length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub coord: TileCoord,
    pub plain: Option<Vec<u8>>,
    pub labeled: Option<Vec<u8>>,
}

impl TileRecord {
    /// Creates a record with no payloads.
    pub fn placeholder(coord: TileCoord) -> Self {
        Self {
            coord,
            plain: None,
            labeled: None,
        }
    }

    /// Creates a record carrying a single variant's payload.
    pub fn with_payload(coord: TileCoord, variant: TileVariant, data: Vec<u8>) -> Self {
        let mut record = Self::placeholder(coord);
        record.set_payload(variant, data);
        record
    }

    /// Returns the payload for a variant, treating empty bytes as absent.
    pub fn payload(&self, variant: TileVariant) -> Option<&[u8]> {
        let slot = match variant {
            TileVariant::Plain => &self.plain,
            TileVariant::Labeled => &self.labeled,
        };
        slot.as_deref().filter(|data| !data.is_empty())
    }

    /// Returns true if the variant's payload is present and non-empty.
    pub fn has_payload(&self, variant: TileVariant) -> bool {
        self.payload(variant).is_some()
    }

    /// Replaces the variant's payload.
    pub fn set_payload(&mut self, variant: TileVariant, data: Vec<u8>) {
        match variant {
            TileVariant::Plain => self.plain = Some(data),
            TileVariant::Labeled => self.labeled = Some(data),
        }
    }

    /// Returns true if neither variant carries data.
    pub fn is_placeholder(&self) -> bool {
        self.state() == TileState::Placeholder
    }

    pub fn state(&self) -> TileState {
        match (
            self.has_payload(TileVariant::Plain),
            self.has_payload(TileVariant::Labeled),
        ) {
            (false, false) => TileState::Placeholder,
            (true, true) => TileState::Complete,
            _ => TileState::Partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord() -> TileCoord {
        TileCoord::new(10, 20, 12)
    }

    #[test]
    fn test_placeholder_state() {
        let record = TileRecord::placeholder(coord());
        assert!(record.is_placeholder());
        assert_eq!(record.state(), TileState::Placeholder);
    }

    #[test]
    fn test_empty_payload_counts_as_absent() {
        let record = TileRecord::with_payload(coord(), TileVariant::Plain, Vec::new());
        assert!(!record.has_payload(TileVariant::Plain));
        assert_eq!(record.state(), TileState::Placeholder);
    }

    #[test]
    fn test_partial_and_complete_states() {
        let mut record = TileRecord::with_payload(coord(), TileVariant::Labeled, vec![1, 2]);
        assert_eq!(record.state(), TileState::Partial);
        assert_eq!(record.payload(TileVariant::Labeled), Some(&[1u8, 2][..]));
        assert_eq!(record.payload(TileVariant::Plain), None);

        record.set_payload(TileVariant::Plain, vec![3]);
        assert_eq!(record.state(), TileState::Complete);
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("Plain".parse::<TileVariant>(), Ok(TileVariant::Plain));
        assert_eq!("labelled".parse::<TileVariant>(), Ok(TileVariant::Labeled));
        assert!("satellite".parse::<TileVariant>().is_err());
    }

    #[test]
    fn test_variant_columns_differ() {
        assert_ne!(TileVariant::Plain.column(), TileVariant::Labeled.column());
    }
}
