//! Firmware store for the BIOS component parts a console dump is split into.
//!
//! The store only validates and retains byte buffers. Mapping them into the
//! EE address space is the memory subsystem's job, which rebuilds its region
//! table from the store after every successful load.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::memory::RegionOverlapError;

/// Number of distinct firmware part kinds.
pub const FIRMWARE_KIND_COUNT: usize = 6;

/// Closed set of firmware parts a dump may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FirmwareKind {
    /// Main boot ROM (`rom0`), mapped at the reset vector.
    Rom,
    /// DVD player ROM.
    Rom1,
    /// Chinese font ROM present on some regional models.
    Rom2,
    /// Encrypted DVD player extension ROM.
    Erom,
    /// Mechanism controller EEPROM contents.
    Nvm,
    /// Mechanism controller firmware version block.
    Mec,
}

impl FirmwareKind {
    /// Every kind in stable display order.
    pub const ALL: [Self; FIRMWARE_KIND_COUNT] = [
        Self::Rom,
        Self::Rom1,
        Self::Rom2,
        Self::Erom,
        Self::Nvm,
        Self::Mec,
    ];

    /// Stable slot index used by fixed-size per-kind tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Canonical upper-case host label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rom => "ROM",
            Self::Rom1 => "ROM1",
            Self::Rom2 => "ROM2",
            Self::Erom => "EROM",
            Self::Nvm => "NVM",
            Self::Mec => "MEC",
        }
    }

    /// Largest buffer accepted for this kind.
    ///
    /// CPU-visible parts are bounded by their mapping window so a buffer can
    /// never spill into a neighbouring region.
    #[must_use]
    pub const fn max_len(self) -> usize {
        match self {
            Self::Rom => 0x0040_0000,
            Self::Rom1 => 0x0004_0000,
            Self::Rom2 => 0x0008_0000,
            Self::Erom => 0x001C_0000,
            Self::Nvm => 0x0001_0000,
            Self::Mec => 0x0000_1000,
        }
    }

    /// Sizes real console dumps of this kind are known to have.
    #[must_use]
    pub const fn typical_lens(self) -> &'static [usize] {
        match self {
            Self::Rom => &[0x0040_0000],
            Self::Rom1 => &[0x0004_0000],
            Self::Rom2 => &[0x0008_0000],
            Self::Erom => &[0x001C_0000],
            Self::Nvm => &[0x0400],
            Self::Mec => &[0x0004],
        }
    }

    /// `true` when the EE can address this part directly.
    #[must_use]
    pub const fn is_cpu_visible(self) -> bool {
        matches!(self, Self::Rom | Self::Rom1 | Self::Rom2 | Self::Erom)
    }
}

impl fmt::Display for FirmwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Host supplied a label outside the closed firmware kind set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized firmware kind label `{label}`")]
pub struct ParseFirmwareKindError {
    /// Label as received from the host.
    pub label: String,
}

impl FromStr for FirmwareKind {
    type Err = ParseFirmwareKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let kind = if label.eq_ignore_ascii_case("ROM") || label.eq_ignore_ascii_case("BIN") {
            Self::Rom
        } else if label.eq_ignore_ascii_case("ROM1") {
            Self::Rom1
        } else if label.eq_ignore_ascii_case("ROM2") {
            Self::Rom2
        } else if label.eq_ignore_ascii_case("EROM") {
            Self::Erom
        } else if label.eq_ignore_ascii_case("NVM") {
            Self::Nvm
        } else if label.eq_ignore_ascii_case("MEC") {
            Self::Mec
        } else {
            return Err(ParseFirmwareKindError {
                label: s.to_owned(),
            });
        };
        Ok(kind)
    }
}

/// Configuration error returned when a firmware buffer is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LoadError {
    /// Zero-length buffer.
    #[error("{kind} buffer is empty")]
    Empty {
        /// Part the buffer was offered for.
        kind: FirmwareKind,
    },
    /// Buffer larger than the part's mapping window.
    #[error("{kind} buffer of {len} bytes exceeds the {max}-byte limit")]
    TooLarge {
        /// Part the buffer was offered for.
        kind: FirmwareKind,
        /// Offered length.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },
    /// The part could not be mapped next to the regions already present.
    #[error(transparent)]
    Unmappable(#[from] RegionOverlapError),
}

/// One installed firmware buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwarePart {
    kind: FirmwareKind,
    bytes: Arc<[u8]>,
    generation: u64,
    plausible: bool,
}

impl FirmwarePart {
    /// Part kind.
    #[must_use]
    pub const fn kind(&self) -> FirmwareKind {
        self.kind
    }

    /// Immutable buffer contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the buffer, used by region-table construction.
    #[must_use]
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Buffer length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; empty buffers are never installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Store generation at which this buffer was installed.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// `false` when the size is accepted but unlike any known dump.
    #[must_use]
    pub const fn is_plausible(&self) -> bool {
        self.plausible
    }
}

/// Holds at most one active buffer per firmware kind.
#[derive(Debug, Clone, Default)]
pub struct FirmwareStore {
    parts: [Option<FirmwarePart>; FIRMWARE_KIND_COUNT],
    generation: u64,
}

impl FirmwareStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a buffer against the kind's bounds without installing it.
    ///
    /// Returns the plausibility flag the part would carry.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Empty`] for a zero-length buffer and
    /// [`LoadError::TooLarge`] when the buffer exceeds [`FirmwareKind::max_len`].
    pub fn validate(kind: FirmwareKind, bytes: &[u8]) -> Result<bool, LoadError> {
        if bytes.is_empty() {
            return Err(LoadError::Empty { kind });
        }
        let max = kind.max_len();
        if bytes.len() > max {
            return Err(LoadError::TooLarge {
                kind,
                len: bytes.len(),
                max,
            });
        }
        Ok(kind.typical_lens().contains(&bytes.len()))
    }

    /// Installs `bytes` as the active buffer for `kind`, replacing any prior one.
    ///
    /// The previous buffer is only dropped once validation has passed, so a
    /// rejected load leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Propagates [`FirmwareStore::validate`] failures.
    pub fn load(&mut self, kind: FirmwareKind, bytes: &[u8]) -> Result<&FirmwarePart, LoadError> {
        let plausible = Self::validate(kind, bytes)?;
        if !plausible {
            tracing::warn!(
                %kind,
                len = bytes.len(),
                "firmware size does not match any known dump; accepting anyway"
            );
        }
        if kind == FirmwareKind::Nvm {
            if let Some(id) = nvm_console_id(bytes) {
                tracing::info!(console_id = %id, "loaded NVM");
            }
        }

        self.generation += 1;
        let slot = &mut self.parts[kind.index()];
        let part = slot.insert(FirmwarePart {
            kind,
            bytes: Arc::from(bytes),
            generation: self.generation,
            plausible,
        });
        tracing::info!(
            %kind,
            len = part.len(),
            generation = part.generation,
            "firmware part installed"
        );
        Ok(&*part)
    }

    /// Active buffer for `kind`, if loaded.
    #[must_use]
    pub fn get(&self, kind: FirmwareKind) -> Option<&FirmwarePart> {
        self.parts[kind.index()].as_ref()
    }

    /// `true` once the main boot ROM is present.
    #[must_use]
    pub fn has_rom(&self) -> bool {
        self.get(FirmwareKind::Rom).is_some()
    }

    /// Number of successful loads since creation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Installed parts in [`FirmwareKind::ALL`] order.
    pub fn parts(&self) -> impl Iterator<Item = &FirmwarePart> + '_ {
        self.parts.iter().flatten()
    }

    /// Drops every installed part. The generation counter keeps counting.
    pub fn clear(&mut self) {
        self.parts = Default::default();
    }
}

/// Formats the leading six NVM bytes the way the console reports its identifier.
fn nvm_console_id(bytes: &[u8]) -> Option<String> {
    let id = bytes.get(..6)?;
    Some(
        id.iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

#[cfg(test)]
mod tests {
    use super::{nvm_console_id, FirmwareKind, FirmwareStore, LoadError};
    use rstest::rstest;

    #[rstest]
    #[case("ROM", FirmwareKind::Rom)]
    #[case("bin", FirmwareKind::Rom)]
    #[case("rom1", FirmwareKind::Rom1)]
    #[case("ROM2", FirmwareKind::Rom2)]
    #[case(" EROM ", FirmwareKind::Erom)]
    #[case("Nvm", FirmwareKind::Nvm)]
    #[case("MEC", FirmwareKind::Mec)]
    fn labels_parse_case_insensitively(#[case] label: &str, #[case] kind: FirmwareKind) {
        assert_eq!(label.parse::<FirmwareKind>(), Ok(kind));
    }

    #[rstest]
    #[case("")]
    #[case("ROM3")]
    #[case("BIOS")]
    #[case("rom0")]
    fn unknown_labels_are_rejected(#[case] label: &str) {
        let err = label.parse::<FirmwareKind>().expect_err("label must be rejected");
        assert_eq!(err.label, label);
    }

    #[test]
    fn labels_roundtrip_through_display() {
        for kind in FirmwareKind::ALL {
            assert_eq!(kind.to_string().parse::<FirmwareKind>(), Ok(kind));
        }
    }

    #[test]
    fn empty_buffer_is_rejected_and_store_is_untouched() {
        let mut store = FirmwareStore::new();
        store.load(FirmwareKind::Rom, &[1, 2, 3, 4]).expect("valid rom");

        let err = store.load(FirmwareKind::Rom, &[]).expect_err("empty rom");
        assert_eq!(err, LoadError::Empty { kind: FirmwareKind::Rom });
        assert_eq!(store.get(FirmwareKind::Rom).map(|p| p.bytes().to_vec()), Some(vec![1, 2, 3, 4]));
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let mut store = FirmwareStore::new();
        let bytes = vec![0_u8; FirmwareKind::Mec.max_len() + 1];
        let err = store.load(FirmwareKind::Mec, &bytes).expect_err("too large");
        assert!(matches!(err, LoadError::TooLarge { kind: FirmwareKind::Mec, .. }));
        assert!(store.get(FirmwareKind::Mec).is_none());
    }

    #[test]
    fn reload_replaces_buffer_and_bumps_generation() {
        let mut store = FirmwareStore::new();
        store.load(FirmwareKind::Rom1, &[0xAA; 8]).expect("first");
        store.load(FirmwareKind::Rom1, &[0xBB; 4]).expect("second");

        let part = store.get(FirmwareKind::Rom1).expect("rom1 present");
        assert_eq!(part.bytes(), &[0xBB; 4]);
        assert_eq!(part.generation(), 2);
        assert_eq!(store.parts().count(), 1);
    }

    #[test]
    fn plausibility_flags_unusual_sizes_without_rejecting() {
        let mut store = FirmwareStore::new();
        assert!(!store.load(FirmwareKind::Mec, &[0; 16]).expect("odd mec").is_plausible());
        assert!(store.load(FirmwareKind::Mec, &[0; 4]).expect("mec").is_plausible());
    }

    #[test]
    fn only_rom_parts_are_cpu_visible() {
        assert!(FirmwareKind::Rom.is_cpu_visible());
        assert!(FirmwareKind::Erom.is_cpu_visible());
        assert!(!FirmwareKind::Nvm.is_cpu_visible());
        assert!(!FirmwareKind::Mec.is_cpu_visible());
    }

    #[test]
    fn nvm_console_id_needs_six_bytes() {
        assert_eq!(nvm_console_id(&[0, 1, 2, 3, 4]), None);
        assert_eq!(
            nvm_console_id(&[0x00, 0x1F, 0xA7, 0x10, 0x20, 0xFF, 0x99]).as_deref(),
            Some("00:1F:A7:10:20:FF")
        );
    }

    #[test]
    fn clear_drops_parts_but_keeps_generation() {
        let mut store = FirmwareStore::new();
        store.load(FirmwareKind::Rom, &[0; 4]).expect("rom");
        store.clear();
        assert!(!store.has_rom());
        assert_eq!(store.generation(), 1);
    }
}
