//! Bulk transfer state machine.
//!
//! Tracks which patch an inbound bulk dump belongs to. The device does not
//! say which slot a dump came from, so a dump is only accepted while a
//! request (or a verified upload) for a specific slot is outstanding.
//! Batches of requests and uploads are worked through one response at a
//! time; uploads that need no confirmation go out back to back.

use std::collections::VecDeque;

use crate::patch::{Patch, PatchStore, StoreError};
use crate::sysex::{bulk_dump, dump_request};

/// What the session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing requested; inbound dumps are unexpected.
    Idle,
    /// A dump request for `patch` is outstanding.
    AwaitingDumpResponse { patch: usize },
    /// `patch` was uploaded and read back; waiting for the echo.
    AwaitingImportConfirmation { patch: usize },
}

/// One unit of transfer work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferJob {
    /// Ask the device for a patch.
    Request(usize),
    /// Send a patch, optionally reading it back to confirm.
    Upload { patch: usize, verify: bool },
}

impl TransferJob {
    fn patch(&self) -> usize {
        match *self {
            TransferJob::Request(patch) | TransferJob::Upload { patch, .. } => patch,
        }
    }
}

/// Result of feeding a bulk dump payload to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    /// Arrived while idle; dropped.
    Unexpected,
    /// Payload size was wrong; dropped and still waiting.
    WrongLength { len: usize },
    /// Stored as the response to a request.
    Received { patch: usize },
    /// Echo matched the upload.
    Verified { patch: usize },
    /// Echo differed from the upload.
    Mismatch { patch: usize },
}

/// Outcome plus whatever frames the next job needs sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpResponse {
    pub outcome: DumpOutcome,
    pub frames: Vec<Vec<u8>>,
    /// The last outstanding job just completed.
    pub finished: bool,
}

/// Request/upload sequencer.
#[derive(Debug)]
pub struct BulkTransfer {
    state: TransferState,
    jobs: VecDeque<TransferJob>,
    uploaded: Option<Patch>,
}

impl BulkTransfer {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            jobs: VecDeque::new(),
            uploaded: None,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Jobs not yet started.
    pub fn remaining(&self) -> usize {
        self.jobs.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_idle(&self) -> bool {
        self.state == TransferState::Idle && self.jobs.is_empty()
    }

    /// Start a new batch, replacing whatever was outstanding.
    ///
    /// Returns the frames to queue. Every patch index is checked against the
    /// store first; on error nothing changes.
    pub fn start(
        &mut self,
        jobs: impl IntoIterator<Item = TransferJob>,
        store: &PatchStore,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let jobs: VecDeque<TransferJob> = jobs.into_iter().collect();
        if let Some(bad) = jobs.iter().find(|job| job.patch() >= store.len()) {
            return Err(StoreError::NoSuchPatch(bad.patch()));
        }
        if self.state != TransferState::Idle {
            log::info!(target: "transfer", "Replacing outstanding transfer {:?}", self.state);
        }
        self.jobs = jobs;
        self.state = TransferState::Idle;
        self.uploaded = None;
        Ok(self.advance(store))
    }

    /// Abandon the current wait and every queued job.
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            log::info!(
                target: "transfer",
                "Cancelled transfer ({} jobs left)",
                self.jobs.len()
            );
        }
        self.jobs.clear();
        self.state = TransferState::Idle;
        self.uploaded = None;
    }

    /// Run jobs until one needs a response.
    fn advance(&mut self, store: &PatchStore) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Some(job) = self.jobs.pop_front() {
            match job {
                TransferJob::Request(patch) => {
                    frames.push(dump_request(patch as u8));
                    self.state = TransferState::AwaitingDumpResponse { patch };
                    return frames;
                }
                TransferJob::Upload { patch, verify } => {
                    // Indices were checked in start(); a shrunken store is the only miss.
                    let Some(data) = store.patch(patch) else {
                        log::warn!(target: "transfer", "Skipping upload of missing patch {}", patch);
                        continue;
                    };
                    frames.push(bulk_dump(data.as_bytes()));
                    if verify {
                        frames.push(dump_request(patch as u8));
                        self.uploaded = Some(data.clone());
                        self.state = TransferState::AwaitingImportConfirmation { patch };
                        return frames;
                    }
                }
            }
        }
        self.state = TransferState::Idle;
        frames
    }

    /// Handle a checksum-valid bulk dump payload.
    pub fn on_bulk_dump(&mut self, payload: &[u8], store: &mut PatchStore) -> DumpResponse {
        let outcome = match self.state {
            TransferState::Idle => DumpOutcome::Unexpected,
            TransferState::AwaitingDumpResponse { patch } => match Patch::from_bytes(payload) {
                Ok(received) => match store.store_received(patch, received) {
                    Ok(()) => DumpOutcome::Received { patch },
                    Err(err) => {
                        log::warn!(target: "transfer", "Dropping response: {}", err);
                        DumpOutcome::Unexpected
                    }
                },
                Err(_) => DumpOutcome::WrongLength { len: payload.len() },
            },
            TransferState::AwaitingImportConfirmation { patch } => {
                match Patch::from_bytes(payload) {
                    Ok(echo) => {
                        let matches = self.uploaded.as_ref() == Some(&echo);
                        if let Err(err) = store.set_device_patch(patch, echo) {
                            log::warn!(target: "transfer", "Dropping echo: {}", err);
                        }
                        if matches {
                            DumpOutcome::Verified { patch }
                        } else {
                            DumpOutcome::Mismatch { patch }
                        }
                    }
                    Err(_) => DumpOutcome::WrongLength { len: payload.len() },
                }
            }
        };

        let completed = matches!(
            outcome,
            DumpOutcome::Received { .. } | DumpOutcome::Verified { .. } | DumpOutcome::Mismatch { .. }
        );
        if !completed {
            return DumpResponse {
                outcome,
                frames: Vec::new(),
                finished: false,
            };
        }

        self.uploaded = None;
        let frames = self.advance(store);
        DumpResponse {
            outcome,
            frames,
            finished: self.is_idle(),
        }
    }
}

impl Default for BulkTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PATCH_TOTAL_LENGTH;
    use crate::sysex::BULK_HEADER;

    fn payload(fill: u8) -> Vec<u8> {
        vec![fill; PATCH_TOTAL_LENGTH]
    }

    #[test]
    fn test_idle_dump_is_unexpected() {
        let mut transfer = BulkTransfer::new();
        let mut store = PatchStore::new();
        let response = transfer.on_bulk_dump(&payload(1), &mut store);
        assert_eq!(response.outcome, DumpOutcome::Unexpected);
        assert!(response.frames.is_empty());
        assert_eq!(store.patch(0).unwrap(), &Patch::new());
    }

    #[test]
    fn test_request_then_response() {
        let mut transfer = BulkTransfer::new();
        let mut store = PatchStore::new();
        let frames = transfer.start([TransferJob::Request(7)], &store).unwrap();
        assert_eq!(frames, vec![dump_request(7)]);
        assert_eq!(transfer.state(), TransferState::AwaitingDumpResponse { patch: 7 });

        let response = transfer.on_bulk_dump(&payload(0x11), &mut store);
        assert_eq!(response.outcome, DumpOutcome::Received { patch: 7 });
        assert!(response.finished);
        assert_eq!(store.patch(7).unwrap().as_bytes(), &payload(0x11)[..]);
        assert_eq!(transfer.state(), TransferState::Idle);
    }

    #[test]
    fn test_wrong_length_keeps_waiting() {
        let mut transfer = BulkTransfer::new();
        let mut store = PatchStore::new();
        transfer.start([TransferJob::Request(2)], &store).unwrap();

        let response = transfer.on_bulk_dump(&[0u8; 100], &mut store);
        assert_eq!(response.outcome, DumpOutcome::WrongLength { len: 100 });
        assert_eq!(transfer.state(), TransferState::AwaitingDumpResponse { patch: 2 });
    }

    #[test]
    fn test_batch_requests_one_at_a_time() {
        let mut transfer = BulkTransfer::new();
        let mut store = PatchStore::new();
        let frames = transfer
            .start((0..3).map(TransferJob::Request), &store)
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(transfer.remaining(), 2);

        let first = transfer.on_bulk_dump(&payload(1), &mut store);
        assert_eq!(first.frames, vec![dump_request(1)]);
        assert!(!first.finished);
        transfer.on_bulk_dump(&payload(2), &mut store);
        let last = transfer.on_bulk_dump(&payload(3), &mut store);
        assert!(last.finished);
        assert_eq!(store.patch(2).unwrap().as_bytes()[0], 3);
    }

    #[test]
    fn test_unverified_uploads_go_out_together() {
        let mut transfer = BulkTransfer::new();
        let store = PatchStore::new();
        let frames = transfer
            .start(
                (0..3).map(|patch| TransferJob::Upload { patch, verify: false }),
                &store,
            )
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.starts_with(&BULK_HEADER)));
        assert!(transfer.is_idle());
    }

    #[test]
    fn test_verified_upload_match_and_mismatch() {
        let mut transfer = BulkTransfer::new();
        let mut store = PatchStore::new();
        store.set_bytes(0, 40, &[0x22]).unwrap();

        let frames = transfer
            .start([TransferJob::Upload { patch: 0, verify: true }], &store)
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], dump_request(0));
        assert_eq!(
            transfer.state(),
            TransferState::AwaitingImportConfirmation { patch: 0 }
        );

        let echo = store.patch(0).unwrap().as_bytes().to_vec();
        let response = transfer.on_bulk_dump(&echo, &mut store);
        assert_eq!(response.outcome, DumpOutcome::Verified { patch: 0 });
        assert!(!store.is_dirty(0));

        transfer
            .start([TransferJob::Upload { patch: 0, verify: true }], &store)
            .unwrap();
        let response = transfer.on_bulk_dump(&payload(0), &mut store);
        assert_eq!(response.outcome, DumpOutcome::Mismatch { patch: 0 });
        assert!(store.is_dirty(0));
    }

    #[test]
    fn test_start_validates_indices() {
        let mut transfer = BulkTransfer::new();
        let store = PatchStore::with_len(4);
        assert_eq!(
            transfer.start([TransferJob::Request(1), TransferJob::Request(4)], &store),
            Err(StoreError::NoSuchPatch(4))
        );
        assert!(transfer.is_idle());
    }

    #[test]
    fn test_cancel() {
        let mut transfer = BulkTransfer::new();
        let mut store = PatchStore::new();
        transfer
            .start((0..5).map(TransferJob::Request), &store)
            .unwrap();
        transfer.cancel();
        assert!(transfer.is_idle());
        let response = transfer.on_bulk_dump(&payload(9), &mut store);
        assert_eq!(response.outcome, DumpOutcome::Unexpected);
    }
}
