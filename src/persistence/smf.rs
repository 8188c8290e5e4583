//! Standard MIDI File banks.
//!
//! A bank is a single track of SysEx events, each one a complete bulk dump
//! frame, in slot order. Reading accepts any track layout and keeps only
//! events that are valid patch dumps.

use std::path::Path;

use midly::num::{u15, u28};
use midly::{Format, Header, MetaMessage, Smf, Timing, TrackEvent, TrackEventKind};

use super::bank::BankError;
use crate::patch::{Patch, NUM_PATCHES, PATCH_TOTAL_LENGTH};
use crate::sysex::{bulk_dump, validate_bulk_dump, SYSEX_START};

const TICKS_PER_QUARTER: u16 = 96;

/// Delta time between consecutive dumps.
const DUMP_SPACING_TICKS: u32 = 56;

/// Extract patches from an SMF image, in the order their dumps appear.
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Patch>, BankError> {
    let smf = Smf::parse(bytes)?;

    let mut patches = Vec::new();
    for event in smf.tracks.iter().flatten() {
        let TrackEventKind::SysEx(data) = &event.kind else {
            continue;
        };
        // midly strips the leading F0
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(SYSEX_START);
        frame.extend_from_slice(data);

        match validate_bulk_dump(&frame) {
            Ok(payload) if payload.len() == PATCH_TOTAL_LENGTH => {
                let number = patches.len() + 1;
                let patch = Patch::from_bytes(payload)
                    .map_err(|source| BankError::InvalidPatch { number, source })?;
                patches.push(patch);
            }
            Ok(payload) => {
                log::debug!(target: "persistence", "Skipping {} byte dump in SMF", payload.len())
            }
            Err(e) => log::debug!(target: "persistence", "Skipping SysEx event in SMF: {}", e),
        }
        if patches.len() == NUM_PATCHES {
            break;
        }
    }

    if patches.is_empty() {
        return Err(BankError::NoPatchesInSmf);
    }
    Ok(patches)
}

/// Render patches as a format 0 SMF. At most 99 patches are written.
pub fn to_bytes(patches: &[Patch]) -> Result<Vec<u8>, BankError> {
    let frames: Vec<Vec<u8>> = patches
        .iter()
        .take(NUM_PATCHES)
        .map(|patch| bulk_dump(patch.as_bytes()))
        .collect();

    let mut track: Vec<TrackEvent> = frames
        .iter()
        .map(|frame| TrackEvent {
            delta: u28::new(DUMP_SPACING_TICKS),
            kind: TrackEventKind::SysEx(&frame[1..]),
        })
        .collect();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    smf.tracks.push(track);

    let mut out = Vec::new();
    smf.write_std(&mut out)?;
    Ok(out)
}

/// Load patches from an SMF file.
pub fn load_from_file(path: &Path) -> Result<Vec<Patch>, BankError> {
    let bytes = std::fs::read(path)?;
    from_bytes(&bytes)
}

/// Save patches to an SMF file.
pub fn save_to_file(patches: &[Patch], path: &Path) -> Result<(), BankError> {
    std::fs::write(path, to_bytes(patches)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysex::BULK_HEADER;

    fn named(name: &str) -> Patch {
        let mut patch = Patch::new();
        patch.set_name(name);
        patch
    }

    fn smf_with_events(events: Vec<TrackEventKind>) -> Vec<u8> {
        let mut track: Vec<TrackEvent> = events
            .into_iter()
            .map(|kind| TrackEvent {
                delta: u28::new(0),
                kind,
            })
            .collect();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));
        smf.tracks.push(track);
        let mut out = Vec::new();
        smf.write_std(&mut out).unwrap();
        out
    }

    #[test]
    fn test_written_file_layout() {
        let bytes = to_bytes(&[named("One"), named("Two")]).unwrap();
        assert_eq!(&bytes[..4], b"MThd");

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        assert_eq!(smf.tracks.len(), 1);

        let track = &smf.tracks[0];
        assert_eq!(track.len(), 3);
        assert_eq!(track[0].delta.as_int(), DUMP_SPACING_TICKS);
        match &track[0].kind {
            TrackEventKind::SysEx(data) => {
                assert_eq!(&data[..BULK_HEADER.len() - 1], &BULK_HEADER[1..]);
                assert_eq!(data.len(), PATCH_TOTAL_LENGTH + BULK_HEADER.len() + 1);
            }
            other => panic!("expected SysEx, got {:?}", other),
        }
        assert_eq!(track[2].kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.mid");
        save_to_file(&[named("Lead"), named("Clean")], &path).unwrap();

        let patches = load_from_file(&path).unwrap();
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].name(), "Lead");
        assert_eq!(patches[1].name(), "Clean");
    }

    #[test]
    fn test_foreign_events_are_skipped() {
        let good = bulk_dump(named("Keep").as_bytes());
        let mut corrupt = bulk_dump(named("Drop").as_bytes());
        let at = corrupt.len() - 2;
        corrupt[at] ^= 0x01;
        let short = bulk_dump(&[0x01, 0x02, 0x03]);
        let other_vendor = [0x41, 0x10, 0x42, 0xF7];

        let bytes = smf_with_events(vec![
            TrackEventKind::SysEx(&other_vendor),
            TrackEventKind::SysEx(&corrupt[1..]),
            TrackEventKind::SysEx(&short[1..]),
            TrackEventKind::SysEx(&good[1..]),
        ]);
        let patches = from_bytes(&bytes).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].name(), "Keep");
    }

    #[test]
    fn test_file_without_dumps_is_an_error() {
        let bytes = smf_with_events(Vec::new());
        assert!(matches!(from_bytes(&bytes), Err(BankError::NoPatchesInSmf)));
    }

    #[test]
    fn test_not_a_midi_file() {
        assert!(matches!(from_bytes(b"UB99 V1.00"), Err(BankError::SmfError(_))));
    }

    #[test]
    fn test_at_most_99_patches() {
        let patches = vec![named("Many"); NUM_PATCHES + 3];
        let loaded = from_bytes(&to_bytes(&patches).unwrap()).unwrap();
        assert_eq!(loaded.len(), NUM_PATCHES);
    }
}
