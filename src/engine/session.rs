//! Editor session.
//!
//! Owns everything one connected editor needs: the patch store, the outbound
//! queue, the pacing timer and the bulk transfer state machine. It is driven
//! from a single thread: the host forwards inbound frames with
//! [`EditorSession::handle_sysex`], calls [`EditorSession::tick`] whenever
//! [`EditorSession::next_deadline`] passes, and drains events afterwards.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::channels::InboundReceiver;
use super::coalescer::OutboundQueue;
use super::events::SessionEvent;
use super::pacing::PacingTimer;
use super::transfer::{BulkTransfer, DumpOutcome, TransferJob, TransferState};
use super::transport::Transport;
use crate::patch::{
    touches_name, PatchStore, StoreError, WriteOutcome, PATCH_NAME, PATCH_NAME_LAST,
};
use crate::sysex::{decode, FrameError, HexBytes, InboundFrame, ParameterAddress, MIN_BULK_FRAME_LENGTH};

/// Whether the editing widget still holds input focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Still editing: send the value, defer the store write.
    Held,
    /// Done editing: write the store now.
    Released,
}

/// One editor connected to one device.
pub struct EditorSession<T: Transport> {
    transport: T,
    store: PatchStore,
    outbound: OutboundQueue,
    pacer: PacingTimer,
    transfer: BulkTransfer,
    events: VecDeque<SessionEvent>,
}

impl<T: Transport> EditorSession<T> {
    /// Create a session with the default 10 ms pacing.
    pub fn new(transport: T, store: PatchStore) -> Self {
        Self::with_pacing(transport, store, PacingTimer::default())
    }

    /// Create a session with an explicit pacing interval.
    pub fn with_pacing_interval(transport: T, store: PatchStore, interval: Duration) -> Self {
        Self::with_pacing(transport, store, PacingTimer::new(interval))
    }

    fn with_pacing(transport: T, store: PatchStore, pacer: PacingTimer) -> Self {
        Self {
            transport,
            store,
            outbound: OutboundQueue::new(),
            pacer,
            transfer: BulkTransfer::new(),
            events: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &PatchStore {
        &self.store
    }

    /// Direct store access for bank operations (swap, copy, import).
    pub fn store_mut(&mut self) -> &mut PatchStore {
        &mut self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    pub fn transfer_state(&self) -> TransferState {
        self.transfer.state()
    }

    /// Nothing queued and nothing outstanding.
    pub fn is_idle(&self) -> bool {
        self.outbound.is_empty() && self.transfer.is_idle()
    }

    /// Take all pending events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain(..)
    }

    /// Choose the patch that parameter edits apply to.
    pub fn select_patch(&mut self, index: usize) -> Result<(), StoreError> {
        self.release_focus()?;
        self.store.select(index)
    }

    // ---------------------------------------------------------------------
    // Realtime edits
    // ---------------------------------------------------------------------

    /// Write `bytes` at `offset` of the selected patch and queue the
    /// matching parameter sends. With focus held the store write waits for
    /// [`Self::release_focus`], but the device hears about it right away.
    /// Either way the store ends up with the value sent last.
    pub fn edit_parameter(
        &mut self,
        offset: usize,
        bytes: &[u8],
        focus: Focus,
        now: Instant,
    ) -> Result<(), StoreError> {
        let patch = self.store.current().ok_or(StoreError::NoPatchSelected)?;
        let outcome = match focus {
            Focus::Released => Some(self.store.set_bytes(patch, offset, bytes)?),
            Focus::Held => self.store.defer(patch, offset, bytes)?,
        };
        self.report_write(outcome);
        self.queue_write(patch, offset, bytes, now);
        Ok(())
    }

    /// Queue parameter sends for bytes already written to the selected
    /// patch.
    pub fn parameter_changed(
        &mut self,
        offset: usize,
        len: usize,
        now: Instant,
    ) -> Result<(), StoreError> {
        let patch = self.store.current().ok_or(StoreError::NoPatchSelected)?;
        let bytes = self.store.bytes(patch, offset, len)?.to_vec();
        if touches_name(offset, len) {
            if let Some(label) = self.store.display_label(patch) {
                self.events.push_back(SessionEvent::PatchRenamed { patch, label });
            }
        }
        self.queue_write(patch, offset, &bytes, now);
        Ok(())
    }

    /// Apply an edit deferred while focus was held.
    pub fn release_focus(&mut self) -> Result<(), StoreError> {
        let outcome = self.store.release_focus()?;
        self.report_write(outcome);
        Ok(())
    }

    fn report_write(&mut self, outcome: Option<WriteOutcome>) {
        if let Some(WriteOutcome {
            patch,
            renamed: Some(label),
        }) = outcome
        {
            self.events.push_back(SessionEvent::PatchRenamed { patch, label });
        }
    }

    /// Split a write into parameter sends. Name bytes always go one per
    /// frame; a write starting at the name also resends the rest of it.
    fn queue_write(&mut self, patch: usize, offset: usize, bytes: &[u8], now: Instant) {
        if bytes.is_empty() {
            return;
        }
        let end = offset + bytes.len();
        if !touches_name(offset, bytes.len()) {
            self.queue_parameter(offset, bytes, now);
            return;
        }

        let name_start = offset.max(PATCH_NAME);
        let name_end = end.min(PATCH_NAME_LAST);
        if offset < name_start {
            self.queue_parameter(offset, &bytes[..name_start - offset], now);
        }
        for at in name_start..name_end {
            let i = at - offset;
            self.queue_parameter(at, &bytes[i..i + 1], now);
        }
        if offset == PATCH_NAME && name_end < PATCH_NAME_LAST {
            if let Ok(rest) = self.store.bytes(patch, name_end, PATCH_NAME_LAST - name_end) {
                let rest = rest.to_vec();
                for (i, byte) in rest.iter().enumerate() {
                    self.queue_parameter(name_end + i, std::slice::from_ref(byte), now);
                }
            }
        }
        if end > name_end {
            self.queue_parameter(name_end, &bytes[name_end - offset..], now);
        }
    }

    fn queue_parameter(&mut self, offset: usize, value: &[u8], now: Instant) {
        let address = ParameterAddress::from_offset(offset);
        if self.outbound.push_parameter(address, value, now) {
            log::trace!(target: "sysex", "Coalesced {:?}", address);
        }
        self.pacer.arm(now);
    }

    fn queue_frames(&mut self, frames: Vec<Vec<u8>>, now: Instant) {
        if frames.is_empty() {
            return;
        }
        for frame in frames {
            self.outbound.push_frame(frame, now);
        }
        self.pacer.arm(now);
    }

    // ---------------------------------------------------------------------
    // Bulk transfers
    // ---------------------------------------------------------------------

    /// Ask the device for one patch.
    pub fn request_patch(&mut self, index: usize, now: Instant) -> Result<(), StoreError> {
        self.start_transfer([TransferJob::Request(index)], now)
    }

    /// Ask the device for every patch, one after another.
    pub fn request_all(&mut self, now: Instant) -> Result<(), StoreError> {
        let count = self.store.len();
        self.start_transfer((0..count).map(TransferJob::Request), now)
    }

    /// Upload one patch. With `verify` the device is asked to send it back
    /// and the echo is compared against what was sent.
    pub fn send_patch(&mut self, index: usize, verify: bool, now: Instant) -> Result<(), StoreError> {
        self.start_transfer([TransferJob::Upload { patch: index, verify }], now)
    }

    /// Upload every patch.
    pub fn send_all(&mut self, verify: bool, now: Instant) -> Result<(), StoreError> {
        let count = self.store.len();
        self.start_transfer(
            (0..count).map(|patch| TransferJob::Upload { patch, verify }),
            now,
        )
    }

    /// Upload only the patches with local edits.
    pub fn send_dirty(&mut self, verify: bool, now: Instant) -> Result<(), StoreError> {
        let dirty = self.store.dirty_patches();
        self.start_transfer(
            dirty
                .into_iter()
                .map(|patch| TransferJob::Upload { patch, verify }),
            now,
        )
    }

    fn start_transfer(
        &mut self,
        jobs: impl IntoIterator<Item = TransferJob>,
        now: Instant,
    ) -> Result<(), StoreError> {
        let frames = self.transfer.start(jobs, &self.store)?;
        self.purge_transfer_frames();
        if !self.transfer.is_idle() || !frames.is_empty() {
            log::info!(target: "transfer", "Transfer started: {:?}", self.transfer.state());
        }
        self.queue_frames(frames, now);
        Ok(())
    }

    /// Abandon any outstanding transfer. Its frames that have not been sent
    /// yet are dropped; parameter sends stay queued.
    pub fn cancel(&mut self) {
        self.transfer.cancel();
        self.purge_transfer_frames();
    }

    /// Drop the unsent frames of a replaced or cancelled transfer.
    fn purge_transfer_frames(&mut self) {
        let dropped = self.outbound.remove_frames();
        if dropped > 0 {
            log::info!(target: "transfer", "Dropped {} unsent transfer frames", dropped);
        }
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    /// Process one inbound SysEx frame.
    pub fn handle_sysex(&mut self, bytes: &[u8], now: Instant) {
        if bytes.len() < MIN_BULK_FRAME_LENGTH {
            log::debug!(target: "sysex", "Ignoring short frame: {}", HexBytes(bytes));
            self.events.push_back(SessionEvent::FrameRejected(FrameError::TooShort {
                len: bytes.len(),
            }));
            return;
        }

        match decode(bytes) {
            InboundFrame::BulkDump { payload } => self.handle_bulk_dump(&payload, now),
            InboundFrame::Malformed(err) => {
                match err {
                    FrameError::ChecksumMismatch { .. } => {
                        log::warn!(target: "sysex", "Checksum error: {}", err)
                    }
                    _ => log::debug!(target: "sysex", "Dropping frame: {}", err),
                }
                self.events.push_back(SessionEvent::FrameRejected(err));
            }
            InboundFrame::ParameterSend { address, .. } => {
                log::debug!(target: "sysex", "Ignoring inbound parameter send {:?}", address);
            }
            InboundFrame::DumpRequest { patch } => {
                log::debug!(target: "sysex", "Ignoring inbound dump request {:?}", patch);
            }
        }
    }

    fn handle_bulk_dump(&mut self, payload: &[u8], now: Instant) {
        let response = self.transfer.on_bulk_dump(payload, &mut self.store);
        match response.outcome {
            DumpOutcome::Unexpected => {
                log::warn!(target: "transfer", "Unexpected data received");
                self.events.push_back(SessionEvent::UnexpectedData);
            }
            DumpOutcome::WrongLength { len } => {
                log::warn!(target: "transfer", "Bulk dump payload has {} bytes, dropped", len);
                self.events.push_back(SessionEvent::PayloadRejected { len });
            }
            DumpOutcome::Received { patch } => {
                log::info!(target: "transfer", "Received patch {:02}", patch + 1);
                self.events.push_back(SessionEvent::PatchReceived { patch });
            }
            DumpOutcome::Verified { patch } => {
                log::info!(target: "transfer", "Verified patch {:02}", patch + 1);
                self.events.push_back(SessionEvent::PatchVerified { patch });
            }
            DumpOutcome::Mismatch { patch } => {
                log::warn!(target: "transfer", "Patch {:02} differs after upload", patch + 1);
                self.events.push_back(SessionEvent::VerifyMismatch { patch });
            }
        }
        self.queue_frames(response.frames, now);
        if response.finished {
            self.events.push_back(SessionEvent::TransferFinished);
        }
    }

    /// Feed every frame waiting in `inbound` to [`Self::handle_sysex`].
    pub fn process_inbound(&mut self, inbound: &mut InboundReceiver, now: Instant) -> usize {
        let mut count = 0;
        while let Some(frame) = inbound.recv() {
            self.handle_sysex(&frame.bytes, now);
            count += 1;
        }
        count
    }

    // ---------------------------------------------------------------------
    // Pacing
    // ---------------------------------------------------------------------

    /// When [`Self::tick`] next has work, if ever.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pacer.deadline()
    }

    /// Send at most one queued frame if the pacing timer has fired.
    /// Returns true if a frame was handed to the transport.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.pacer.is_due(now) {
            return false;
        }
        let sent = match self.outbound.pop() {
            Some(record) => {
                let frame = record.message.to_frame();
                log::trace!(
                    target: "sysex",
                    "Queued for {:?}",
                    now.saturating_duration_since(record.enqueued_at)
                );
                log::debug!(target: "sysex", "-> {}", HexBytes(&frame));
                match self.transport.send_sysex(&frame) {
                    Ok(()) => true,
                    Err(err) => {
                        log::error!(target: "midi", "{}", err);
                        self.events.push_back(SessionEvent::SendFailed(err));
                        false
                    }
                }
            }
            None => false,
        };
        self.pacer.fired(now, !self.outbound.is_empty());
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::channels::{inbound_channel, InboundSysEx};
    use crate::engine::transport::{RecordingTransport, TransportError};
    use crate::patch::{Patch, PATCH_TOTAL_LENGTH};
    use crate::sysex::{bulk_dump, dump_request, parameter_send, Section, PARAMETER_SEND_HEADER};

    const STEP: Duration = Duration::from_millis(10);

    fn session() -> EditorSession<RecordingTransport> {
        let mut session = EditorSession::new(RecordingTransport::new(), PatchStore::new());
        session.select_patch(0).unwrap();
        session
    }

    /// Tick until idle, returning every frame sent.
    fn flush(session: &mut EditorSession<RecordingTransport>, start: Instant) -> Vec<Vec<u8>> {
        let mut now = start;
        for _ in 0..1000 {
            if session.next_deadline().is_none() {
                break;
            }
            now += STEP;
            session.tick(now);
        }
        session.transport_mut().take_frames()
    }

    fn effect(address: u8) -> ParameterAddress {
        ParameterAddress::new(Section::Effect, address)
    }

    #[test]
    fn test_edit_requires_selected_patch() {
        let mut session = EditorSession::new(RecordingTransport::new(), PatchStore::new());
        assert_eq!(
            session.edit_parameter(40, &[1], Focus::Released, Instant::now()),
            Err(StoreError::NoPatchSelected)
        );
    }

    #[test]
    fn test_same_address_edits_coalesce() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(50, &[0x01], Focus::Released, now).unwrap();
        session.edit_parameter(50, &[0x02], Focus::Released, now).unwrap();

        assert_eq!(session.outbound().len(), 1);
        assert_eq!(session.outbound().queued_value(effect(18)), Some(&[0x02][..]));

        let frames = flush(&mut session, now);
        assert_eq!(frames, vec![parameter_send(effect(18), &[0x02])]);
    }

    #[test]
    fn test_different_addresses_keep_order() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(40, &[0x01], Focus::Released, now).unwrap();
        session.edit_parameter(60, &[0x02], Focus::Released, now).unwrap();

        let frames = flush(&mut session, now);
        assert_eq!(
            frames,
            vec![
                parameter_send(effect(8), &[0x01]),
                parameter_send(effect(28), &[0x02]),
            ]
        );
    }

    #[test]
    fn test_name_write_sends_twelve_frames() {
        let now = Instant::now();
        let mut session = session();
        session
            .edit_parameter(PATCH_NAME, b"Clean Chorus", Focus::Released, now)
            .unwrap();

        let frames = flush(&mut session, now);
        assert_eq!(frames.len(), 12);
        for (i, frame) in frames.iter().enumerate() {
            assert!(frame.starts_with(&PARAMETER_SEND_HEADER));
            assert_eq!(frame[7], Section::Common.byte());
            assert_eq!(frame[8] as usize, PATCH_NAME + i);
            assert_eq!(frame[9], b"Clean Chorus"[i]);
            assert_eq!(frame.len(), 11);
        }

        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![SessionEvent::PatchRenamed {
                patch: 0,
                label: "01 Clean Chorus".to_string()
            }]
        );
    }

    #[test]
    fn test_short_name_write_resends_whole_name() {
        let now = Instant::now();
        let mut session = session();
        session
            .edit_parameter(PATCH_NAME, b"Hi", Focus::Released, now)
            .unwrap();
        let frames = flush(&mut session, now);
        assert_eq!(frames.len(), 12);
        assert_eq!(frames[0][9], b'H');
        assert_eq!(frames[2][8] as usize, PATCH_NAME + 2);
    }

    #[test]
    fn test_write_spanning_name_is_split() {
        let now = Instant::now();
        let mut session = session();
        session
            .edit_parameter(14, &[1, 2, b'A', b'B'], Focus::Released, now)
            .unwrap();
        let frames = flush(&mut session, now);
        let common = |a| ParameterAddress::new(Section::Common, a);
        assert_eq!(frames[0], parameter_send(common(14), &[1, 2]));
        assert_eq!(frames[1], parameter_send(common(16), b"A"));
        assert_eq!(frames[2], parameter_send(common(17), b"B"));
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn test_held_focus_defers_store_write() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(70, &[0x33], Focus::Held, now).unwrap();
        assert_eq!(session.store().bytes(0, 70, 1).unwrap(), &[0x00]);
        assert_eq!(session.outbound().len(), 1);

        session.release_focus().unwrap();
        assert_eq!(session.store().bytes(0, 70, 1).unwrap(), &[0x33]);
    }

    #[test]
    fn test_released_edit_wins_over_held_edit() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(70, &[0x33], Focus::Held, now).unwrap();
        session.edit_parameter(70, &[0x44], Focus::Released, now).unwrap();
        session.release_focus().unwrap();

        assert_eq!(session.store().bytes(0, 70, 1).unwrap(), &[0x44]);
        let frames = flush(&mut session, now);
        assert_eq!(frames, vec![parameter_send(effect(38), &[0x44])]);
    }

    #[test]
    fn test_second_held_edit_keeps_the_first() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(70, &[0x33], Focus::Held, now).unwrap();
        session.edit_parameter(71, &[0x44], Focus::Held, now).unwrap();
        assert_eq!(session.store().bytes(0, 70, 2).unwrap(), &[0x33, 0x00]);

        session.release_focus().unwrap();
        assert_eq!(session.store().bytes(0, 70, 2).unwrap(), &[0x33, 0x44]);
        assert_eq!(flush(&mut session, now).len(), 2);
    }

    #[test]
    fn test_held_name_edit_reports_rename_when_flushed() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(PATCH_NAME, b"Lead", Focus::Held, now).unwrap();
        assert_eq!(session.drain_events().count(), 0);

        session.edit_parameter(40, &[0x01], Focus::Held, now).unwrap();
        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![SessionEvent::PatchRenamed {
                patch: 0,
                label: "01 Lead".to_string()
            }]
        );
    }

    #[test]
    fn test_pacing_sends_one_frame_per_interval() {
        let start = Instant::now();
        let mut session = session();
        assert_eq!(session.next_deadline(), None);

        session.edit_parameter(40, &[1], Focus::Released, start).unwrap();
        session.edit_parameter(41, &[2], Focus::Released, start).unwrap();
        assert_eq!(session.next_deadline(), Some(start + STEP));

        assert!(!session.tick(start + Duration::from_millis(5)));
        assert!(session.tick(start + STEP));
        assert!(!session.tick(start + STEP));
        assert_eq!(session.transport().frames.len(), 1);

        assert!(session.tick(start + STEP * 2));
        assert_eq!(session.next_deadline(), None);
        assert!(!session.tick(start + STEP * 3));
        assert_eq!(session.transport().frames.len(), 2);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let now = Instant::now();
        let mut session = session();
        session.transport_mut().fail_with = Some(TransportError::NotConnected);
        session.edit_parameter(40, &[1], Focus::Released, now).unwrap();
        assert!(!session.tick(now + STEP));
        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(events, vec![SessionEvent::SendFailed(TransportError::NotConnected)]);
    }

    #[test]
    fn test_idle_bulk_dump_is_dropped() {
        let now = Instant::now();
        let mut session = session();
        let before = session.store().patches().to_vec();

        session.handle_sysex(&bulk_dump(&[0x42; PATCH_TOTAL_LENGTH]), now);
        assert_eq!(session.store().patches(), &before[..]);
        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(events, vec![SessionEvent::UnexpectedData]);
    }

    #[test]
    fn test_request_response_round_trip() {
        let now = Instant::now();
        let mut session = session();
        session.request_patch(4, now).unwrap();
        assert_eq!(flush(&mut session, now), vec![dump_request(4)]);
        assert_eq!(
            session.transfer_state(),
            TransferState::AwaitingDumpResponse { patch: 4 }
        );

        let mut device = Patch::new();
        device.set_name("From Device");
        session.handle_sysex(&bulk_dump(device.as_bytes()), now);

        assert_eq!(session.store().patch(4), Some(&device));
        assert_eq!(session.transfer_state(), TransferState::Idle);
        assert!(session.is_idle());
        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::PatchReceived { patch: 4 },
                SessionEvent::TransferFinished
            ]
        );
    }

    #[test]
    fn test_new_request_replaces_unsent_request() {
        let now = Instant::now();
        let mut session = session();
        session.request_patch(0, now).unwrap();
        session.request_patch(5, now).unwrap();
        assert_eq!(flush(&mut session, now), vec![dump_request(5)]);

        let mut device = Patch::new();
        device.set_name("Slot Six");
        session.handle_sysex(&bulk_dump(device.as_bytes()), now);
        assert_eq!(session.store().patch(5), Some(&device));
        assert_eq!(session.store().patch(0), Some(&Patch::new()));
        assert!(session.is_idle());
    }

    #[test]
    fn test_cancel_drops_unsent_transfer_frames() {
        let now = Instant::now();
        let mut session = EditorSession::new(RecordingTransport::new(), PatchStore::with_len(3));
        session.select_patch(0).unwrap();
        session.send_all(false, now).unwrap();
        session.edit_parameter(40, &[0x01], Focus::Released, now).unwrap();
        assert_eq!(session.outbound().len(), 4);

        assert!(session.tick(now + STEP));
        assert_eq!(session.transport_mut().take_frames().len(), 1);
        session.cancel();
        assert_eq!(session.outbound().len(), 1);

        let frames = flush(&mut session, now + STEP);
        assert_eq!(frames, vec![parameter_send(effect(8), &[0x01])]);
        assert!(session.is_idle());
    }

    #[test]
    fn test_failed_start_keeps_current_transfer() {
        let now = Instant::now();
        let mut session = session();
        session.request_patch(2, now).unwrap();
        assert_eq!(
            session.request_patch(99, now),
            Err(StoreError::NoSuchPatch(99))
        );
        assert_eq!(flush(&mut session, now), vec![dump_request(2)]);
        assert_eq!(
            session.transfer_state(),
            TransferState::AwaitingDumpResponse { patch: 2 }
        );
    }

    #[test]
    fn test_corrupt_and_short_frames_are_rejected() {
        let now = Instant::now();
        let mut session = session();
        session.request_patch(0, now).unwrap();

        let mut frame = bulk_dump(&[0x10; PATCH_TOTAL_LENGTH]);
        frame[20] ^= 0x01;
        session.handle_sysex(&frame, now);
        session.handle_sysex(&[0xF0, 0x43, 0xF7], now);

        let events: Vec<_> = session.drain_events().collect();
        assert!(matches!(
            events[0],
            SessionEvent::FrameRejected(FrameError::ChecksumMismatch { .. })
        ));
        assert_eq!(
            events[1],
            SessionEvent::FrameRejected(FrameError::TooShort { len: 3 })
        );
        assert_eq!(
            session.transfer_state(),
            TransferState::AwaitingDumpResponse { patch: 0 }
        );
    }

    #[test]
    fn test_wrong_size_payload_keeps_state() {
        let now = Instant::now();
        let mut session = session();
        session.request_patch(1, now).unwrap();
        session.handle_sysex(&bulk_dump(&[0x01; 40]), now);
        assert_eq!(
            session.transfer_state(),
            TransferState::AwaitingDumpResponse { patch: 1 }
        );
        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(events, vec![SessionEvent::PayloadRejected { len: 40 }]);
    }

    #[test]
    fn test_verified_upload() {
        let now = Instant::now();
        let mut session = session();
        session.edit_parameter(PATCH_NAME, b"Upload", Focus::Released, now).unwrap();
        flush(&mut session, now);
        session.drain_events().for_each(drop);
        assert!(session.store().is_dirty(0));

        session.send_patch(0, true, now).unwrap();
        let frames = flush(&mut session, now);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], bulk_dump(session.store().patch(0).unwrap().as_bytes()));
        assert_eq!(frames[1], dump_request(0));

        let echo = bulk_dump(session.store().patch(0).unwrap().as_bytes());
        session.handle_sysex(&echo, now);
        assert!(!session.store().is_dirty(0));
        let events: Vec<_> = session.drain_events().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::PatchVerified { patch: 0 },
                SessionEvent::TransferFinished
            ]
        );
    }

    #[test]
    fn test_request_all_walks_every_patch() {
        let now = Instant::now();
        let mut session = EditorSession::new(RecordingTransport::new(), PatchStore::with_len(3));
        session.request_all(now).unwrap();
        for index in 0..3u8 {
            assert_eq!(flush(&mut session, now), vec![dump_request(index)]);
            session.handle_sysex(&bulk_dump(&[index; PATCH_TOTAL_LENGTH]), now);
        }
        assert!(session.is_idle());
        assert_eq!(session.store().patch(2).unwrap().as_bytes()[0], 2);
    }

    #[test]
    fn test_process_inbound_drains_channel() {
        let now = Instant::now();
        let mut session = session();
        let (mut tx, mut rx) = inbound_channel(4);
        tx.push(InboundSysEx {
            bytes: bulk_dump(&[0; PATCH_TOTAL_LENGTH]),
            timestamp_us: 0,
        })
        .unwrap();
        assert_eq!(session.process_inbound(&mut rx, now), 1);
        assert_eq!(rx.pending(), 0);
    }
}
