//! Commit sequencing over a device transport.

use std::time::Instant;

use ncbatch_protocol::envelope::{
    edit_config_delete, load_configuration, COMMIT, GET_GROUPS, VALIDATE_CANDIDATE,
};
use ncbatch_protocol::{RequestKind, RpcReply};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::accumulator::{GroupAccumulator, PendingBatch, RawGroup};
use crate::codec::GroupDocument;
use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult};
use crate::transport::Transport;

/// Where the coordinator is in a commit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    /// No commit has run yet.
    Idle,
    /// Opening the transport.
    Dialing,
    /// Sending staged group deletions.
    Deleting,
    /// Loading staged group definitions.
    Loading,
    /// Validating the candidate configuration.
    Validating,
    /// Committing the candidate configuration.
    Committing,
    /// The last commit succeeded.
    Committed,
    /// The last commit failed.
    Failed,
}

/// Counters about coordinator activity.
#[derive(Debug, Clone, Default)]
pub struct CommitStats {
    /// Successful commits.
    pub commits: u64,
    /// Failed commits.
    pub failed_commits: u64,
    /// Read cache hydrations.
    pub hydrations: u64,
    /// Requests sent to the device.
    pub round_trips: u64,
    /// Time of the last successful commit.
    pub last_commit_time: Option<Instant>,
    /// Phase the last failed commit stopped in.
    pub failed_at: Option<CommitPhase>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Accumulates grouped configuration changes and pushes them to the device
/// as one validated commit.
///
/// Staging never touches the device and may be called from many threads at
/// once. Commits and read-cache hydration share one exclusive section, the
/// lock guarding the transport, so their round trips never interleave.
pub struct BatchCoordinator<T: Transport> {
    config: BatchConfig,
    transport: Mutex<Option<T>>,
    accumulator: GroupAccumulator,
    phase: RwLock<CommitPhase>,
    stats: RwLock<CommitStats>,
}

impl<T: Transport> BatchCoordinator<T> {
    /// Creates a coordinator owning the given transport.
    pub fn new(config: BatchConfig, transport: T) -> Self {
        Self {
            config,
            transport: Mutex::new(Some(transport)),
            accumulator: GroupAccumulator::new(),
            phase: RwLock::new(CommitPhase::Idle),
            stats: RwLock::new(CommitStats::default()),
        }
    }

    /// Creates a coordinator with the default configuration.
    pub fn with_transport(transport: T) -> Self {
        Self::new(BatchConfig::default(), transport)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns the accumulator holding cached and staged fragments.
    pub fn accumulator(&self) -> &GroupAccumulator {
        &self.accumulator
    }

    /// Gets the current phase.
    pub fn phase(&self) -> CommitPhase {
        *self.phase.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> CommitStats {
        self.stats.read().clone()
    }

    /// Phase the last failed commit stopped in.
    pub fn failed_at(&self) -> Option<CommitPhase> {
        self.stats.read().failed_at
    }

    /// Returns true once the read cache was populated from the device.
    pub fn is_hydrated(&self) -> bool {
        self.accumulator.is_hydrated()
    }

    fn set_phase(&self, phase: CommitPhase) {
        *self.phase.write() = phase;
    }

    /// Releases the transport handle. Calling it again is a no-op.
    ///
    /// Cached reads stay available afterwards; anything that needs the
    /// device fails with [`BatchError::Closed`].
    pub fn close(&self) -> BatchResult<()> {
        match self.transport.lock().take() {
            Some(mut transport) => transport.close().map_err(BatchError::Driver),
            None => Ok(()),
        }
    }

    /// Reads a group, hydrating the read cache from the device on first use.
    pub fn read_group(&self, group: &str) -> BatchResult<String> {
        let mut transport = self.transport.lock();
        if !self.accumulator.is_hydrated() {
            let transport = transport.as_mut().ok_or(BatchError::Closed)?;
            self.hydrate(transport)?;
        }
        Ok(self.accumulator.read_group(group))
    }

    /// Returns each cache's entry for the group without merging. Never
    /// touches the device.
    pub fn read_group_raw(&self, group: &str) -> RawGroup {
        self.accumulator.read_group_raw(group)
    }

    /// Stages a fragment for the next commit.
    pub fn stage_write(&self, fragment: &str) -> BatchResult<()> {
        self.accumulator.stage_write(fragment)
    }

    /// Stages removal of a group for the next commit.
    pub fn stage_delete(&self, group: &str) -> BatchResult<()> {
        self.accumulator.stage_delete(group)
    }

    /// Stages a replacement of a group's definition.
    ///
    /// The device treats a full replace as delete-then-recreate, so this
    /// stages both and the old group is removed before the new one loads
    /// at commit time.
    pub fn replace_group(&self, group: &str, fragment: &str) -> BatchResult<()> {
        self.accumulator.stage_replace(group, fragment)
    }

    /// Reads a group and decodes it. Returns `None` when the group exists
    /// neither on the device nor in the staged writes.
    pub fn marshal_group<D: GroupDocument>(&self, group: &str) -> BatchResult<Option<D>> {
        let document = self.read_group(group)?;
        if document.is_empty() {
            return Ok(None);
        }
        D::from_document(&document).map(Some)
    }

    /// Encodes an object and stages it. With a group name the object
    /// replaces that group; without one it is staged as a new write.
    pub fn send_transaction<D: GroupDocument>(
        &self,
        group: Option<&str>,
        object: &D,
    ) -> BatchResult<()> {
        let document = object.to_document()?;
        match group {
            Some(group) if !group.is_empty() => self.replace_group(group, &document),
            _ => self.stage_write(&document),
        }
    }

    /// Pushes every staged delete and write to the device, validates the
    /// candidate and commits it.
    ///
    /// The staged state stays readable while the commit runs. On success
    /// the committed fragments leave the pending caches, and anything staged
    /// meanwhile waits for the next commit. On failure the staged state is
    /// kept so the caller can inspect it or retry. A failure after the deletes were sent can leave the candidate
    /// configuration modified; [`CommitStats::failed_at`] tells where the
    /// sequence stopped.
    pub fn commit(&self) -> BatchResult<()> {
        let mut guard = self.transport.lock();
        let transport = guard.as_mut().ok_or(BatchError::Closed)?;

        let batch = self.accumulator.pending_batch();
        match self.run_commit(transport, &batch) {
            Ok(()) => {
                if self.config.reset_after_commit {
                    self.accumulator.settle_committed(&batch);
                }
                self.set_phase(CommitPhase::Committed);
                let mut stats = self.stats.write();
                stats.commits += 1;
                stats.last_commit_time = Some(Instant::now());
                stats.failed_at = None;
                stats.last_error = None;
                info!("candidate configuration committed");
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err);
                Err(err)
            }
        }
    }

    fn run_commit(&self, transport: &mut T, batch: &PendingBatch) -> BatchResult<()> {
        self.set_phase(CommitPhase::Dialing);
        if let Err(err) = transport.dial() {
            return Err(BatchError::transport_with_close(err, transport.close()));
        }

        let deletes = batch.delete_payload();
        if !deletes.is_empty() {
            self.set_phase(CommitPhase::Deleting);
            self.load(transport, &edit_config_delete(&deletes))?;
        }

        let writes = batch.write_payload();
        if !writes.is_empty() {
            self.set_phase(CommitPhase::Loading);
            self.load(transport, &load_configuration(&writes))?;
        }

        // Everything is loaded. Check the candidate before it can reach the
        // running configuration.
        self.set_phase(CommitPhase::Validating);
        let reply = self.send(transport, VALIDATE_CANDIDATE)?;
        if !reply.is_commit_check_success() {
            return Err(self.reject(transport, RequestKind::Validate, reply));
        }

        self.set_phase(CommitPhase::Committing);
        self.stats.write().round_trips += 1;
        let reply = match transport.send_raw(COMMIT) {
            Ok(reply) => reply,
            Err(err) => {
                self.release(transport);
                return Err(BatchError::Driver(err));
            }
        };
        if reply.is_operation_failed() {
            return Err(self.reject(transport, RequestKind::Commit, reply));
        }

        self.release(transport);
        Ok(())
    }

    /// Sends a delete or load envelope and checks its reply.
    fn load(&self, transport: &mut T, document: &str) -> BatchResult<()> {
        let reply = self.send(transport, document)?;
        if reply.is_operation_failed() {
            return Err(self.reject(transport, RequestKind::classify(document), reply));
        }
        Ok(())
    }

    /// Sends one request. A transport failure closes the session and
    /// reports both outcomes.
    fn send(&self, transport: &mut T, document: &str) -> BatchResult<RpcReply> {
        let kind = RequestKind::classify(document);
        debug!(%kind, bytes = document.len(), "sending request");
        self.stats.write().round_trips += 1;
        transport
            .send_raw(document)
            .map_err(|err| BatchError::transport_with_close(err, transport.close()))
    }

    fn reject(&self, transport: &mut T, stage: RequestKind, reply: RpcReply) -> BatchError {
        warn!(%stage, "device rejected request");
        self.release(transport);
        BatchError::Rejected {
            stage,
            reply: reply.data,
        }
    }

    /// Best-effort close once a sequence is over.
    fn release(&self, transport: &mut T) {
        if let Err(err) = transport.close() {
            warn!(error = %err, "failed to close transport");
        }
    }

    fn hydrate(&self, transport: &mut T) -> BatchResult<()> {
        if let Err(err) = transport.dial() {
            return Err(BatchError::transport_with_close(err, transport.close()));
        }
        let reply = self.send(transport, GET_GROUPS)?;
        transport.close().map_err(BatchError::Driver)?;

        if reply.is_operation_failed() {
            warn!("device rejected group listing");
            return Err(BatchError::Rejected {
                stage: RequestKind::GetGroups,
                reply: reply.data,
            });
        }
        self.accumulator.stage_read(&reply.data)?;

        self.stats.write().hydrations += 1;
        info!(
            groups = self.accumulator.cached_group_count(),
            "read cache hydrated"
        );
        Ok(())
    }

    /// Handles a commit error by updating phase and stats.
    fn handle_error(&self, error: &BatchError) {
        let failed_at = self.phase();
        self.set_phase(CommitPhase::Failed);
        let mut stats = self.stats.write();
        stats.failed_commits += 1;
        stats.failed_at = Some(failed_at);
        stats.last_error = Some(error.to_string());
        warn!(phase = ?failed_at, %error, "commit failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawDocument;
    use crate::transport::{MockTransport, TransportError};
    use ncbatch_testkit::fixtures::group_write;

    const SNAPSHOT: &str = "<configuration>\
        <groups><name>base</name><system><host-name>r1</host-name></system></groups>\
        <groups><name>edge</name><snmp/></groups>\
        </configuration>";

    fn coordinator() -> (BatchCoordinator<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let recorder = transport.clone();
        (BatchCoordinator::with_transport(transport), recorder)
    }

    #[test]
    fn coordinator_initial_state() {
        let (coordinator, recorder) = coordinator();
        assert_eq!(coordinator.phase(), CommitPhase::Idle);
        assert_eq!(coordinator.stats().commits, 0);
        assert!(!coordinator.is_hydrated());
        assert_eq!(recorder.dial_count(), 0);
    }

    #[test]
    fn read_hydrates_once() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(RequestKind::GetGroups, SNAPSHOT);

        let base = coordinator.read_group("base").unwrap();
        assert_eq!(
            base,
            "<configuration><groups><name>base</name><system><host-name>r1</host-name></system></groups></configuration>"
        );
        assert!(coordinator.is_hydrated());

        let edge = coordinator.read_group("edge").unwrap();
        assert!(edge.contains("<snmp/>"));

        assert_eq!(recorder.sent_kinds(), vec![RequestKind::GetGroups]);
        assert_eq!(recorder.dial_count(), 1);
        assert_eq!(recorder.close_count(), 1);
        assert_eq!(coordinator.stats().hydrations, 1);
    }

    #[test]
    fn read_of_unknown_group_is_empty() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(RequestKind::GetGroups, SNAPSHOT);
        assert_eq!(coordinator.read_group("missing").unwrap(), "");
    }

    #[test]
    fn hydration_failure_reports_close_error() {
        let (coordinator, recorder) = coordinator();
        recorder.push_send_error(RequestKind::GetGroups, TransportError::new("session dropped"));
        recorder.set_close_error(Some(TransportError::new("close refused")));

        let err = coordinator.read_group("base").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("session dropped"));
        assert!(message.contains("close refused"));
        assert!(!coordinator.is_hydrated());
    }

    #[test]
    fn hydration_dial_failure() {
        let (coordinator, recorder) = coordinator();
        recorder.set_dial_error(Some(TransportError::new("auth failed")));

        let err = coordinator.read_group("base").unwrap_err();
        assert!(matches!(err, BatchError::Transport { close: None, .. }));
        assert!(recorder.sent().is_empty());
        assert_eq!(recorder.close_count(), 1);
    }

    #[test]
    fn rejected_group_listing_does_not_hydrate() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(
            RequestKind::GetGroups,
            "<rpc-error><error-tag>operation-failed</error-tag></rpc-error>",
        );

        let err = coordinator.read_group("base").unwrap_err();
        assert!(matches!(
            err,
            BatchError::Rejected {
                stage: RequestKind::GetGroups,
                ..
            }
        ));
        assert!(!coordinator.is_hydrated());
    }

    #[test]
    fn commit_sends_deletes_then_writes() {
        let (coordinator, recorder) = coordinator();
        coordinator
            .replace_group("base", &group_write("base", "<item>A</item>"))
            .unwrap();

        coordinator.commit().unwrap();

        assert_eq!(
            recorder.sent_kinds(),
            vec![
                RequestKind::Delete,
                RequestKind::Load,
                RequestKind::Validate,
                RequestKind::Commit
            ]
        );
        let load = &recorder.sent_of(RequestKind::Load)[0];
        assert_eq!(
            load,
            "<load-configuration action=\"merge\" format=\"xml\"><configuration>\
             <groups><name>base</name><item>A</item></groups><apply-groups>base</apply-groups>\
             </configuration></load-configuration>"
        );
        assert_eq!(coordinator.phase(), CommitPhase::Committed);
        assert_eq!(coordinator.stats().commits, 1);
        assert_eq!(coordinator.stats().round_trips, 4);
        assert!(!recorder.is_connected());
    }

    #[test]
    fn empty_commit_still_validates() {
        let (coordinator, recorder) = coordinator();
        coordinator.commit().unwrap();
        assert_eq!(
            recorder.sent_kinds(),
            vec![RequestKind::Validate, RequestKind::Commit]
        );
    }

    #[test]
    fn rejected_delete_aborts_commit() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(
            RequestKind::Delete,
            "<rpc-error><error-tag>operation-failed</error-tag></rpc-error>",
        );
        coordinator.stage_delete("base").unwrap();
        coordinator.stage_write(&group_write("edge", "")).unwrap();

        let err = coordinator.commit().unwrap_err();
        assert!(matches!(
            err,
            BatchError::Rejected {
                stage: RequestKind::Delete,
                ..
            }
        ));
        assert!(err.to_string().contains("operation-failed"));
        assert_eq!(recorder.sent_kinds(), vec![RequestKind::Delete]);
        assert_eq!(coordinator.failed_at(), Some(CommitPhase::Deleting));
        assert_eq!(coordinator.phase(), CommitPhase::Failed);

        // Nothing staged was lost.
        assert!(!coordinator.read_group_raw("base").delete.is_empty());
        assert!(!coordinator.read_group_raw("edge").write.is_empty());
    }

    #[test]
    fn send_failure_during_load_combines_errors() {
        let (coordinator, recorder) = coordinator();
        recorder.push_send_error(RequestKind::Load, TransportError::new("broken pipe"));
        recorder.set_close_error(Some(TransportError::new("already gone")));
        coordinator.stage_write(&group_write("base", "")).unwrap();

        let err = coordinator.commit().unwrap_err();
        assert_eq!(
            err.to_string(),
            "driver error: broken pipe, driver close error: already gone"
        );
        assert_eq!(coordinator.failed_at(), Some(CommitPhase::Loading));
    }

    #[test]
    fn commit_transport_error_is_propagated_unchanged() {
        let (coordinator, recorder) = coordinator();
        recorder.push_send_error(RequestKind::Commit, TransportError::new("timeout"));
        recorder.set_close_error(Some(TransportError::new("ignored")));

        let err = coordinator.commit().unwrap_err();
        assert_eq!(err.to_string(), "timeout");
        assert!(matches!(err, BatchError::Driver(_)));
        assert_eq!(coordinator.failed_at(), Some(CommitPhase::Committing));
        assert!(!recorder.is_connected());
    }

    #[test]
    fn rejected_commit_is_an_error() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(RequestKind::Commit, "<error-tag>operation-failed</error-tag>");
        assert!(matches!(
            coordinator.commit(),
            Err(BatchError::Rejected {
                stage: RequestKind::Commit,
                ..
            })
        ));
    }

    #[test]
    fn successful_commit_resets_pending_state() {
        let (coordinator, _recorder) = coordinator();
        coordinator.stage_write(&group_write("base", "")).unwrap();
        coordinator.commit().unwrap();
        assert!(!coordinator.accumulator().has_pending());
    }

    #[test]
    fn pending_state_kept_without_reset() {
        let transport = MockTransport::new();
        let recorder = transport.clone();
        let coordinator = BatchCoordinator::new(
            BatchConfig::new().with_reset_after_commit(false),
            transport,
        );
        coordinator.stage_write(&group_write("base", "")).unwrap();

        coordinator.commit().unwrap();
        coordinator.commit().unwrap();
        assert_eq!(recorder.sent_of(RequestKind::Load).len(), 2);
    }

    #[test]
    fn committed_writes_become_readable_without_rehydration() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(RequestKind::GetGroups, SNAPSHOT);
        coordinator.read_group("base").unwrap();

        coordinator
            .replace_group("base", &group_write("base", "<new/>"))
            .unwrap();
        coordinator.stage_delete("edge").unwrap();
        coordinator.commit().unwrap();

        assert!(coordinator.read_group("base").unwrap().contains("<new/>"));
        assert_eq!(coordinator.read_group("edge").unwrap(), "");
        assert_eq!(recorder.sent_of(RequestKind::GetGroups).len(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let (coordinator, recorder) = coordinator();
        coordinator.close().unwrap();
        coordinator.close().unwrap();
        assert_eq!(recorder.close_count(), 1);

        assert!(matches!(coordinator.commit(), Err(BatchError::Closed)));
        assert!(matches!(
            coordinator.read_group("base"),
            Err(BatchError::Closed)
        ));
        // Staging needs no device.
        coordinator.stage_delete("base").unwrap();
    }

    #[test]
    fn marshal_and_send_transaction() {
        let (coordinator, recorder) = coordinator();
        recorder.push_reply(RequestKind::GetGroups, SNAPSHOT);

        let base: Option<RawDocument> = coordinator.marshal_group("base").unwrap();
        assert!(base.unwrap().0.contains("<host-name>r1</host-name>"));
        let missing: Option<RawDocument> = coordinator.marshal_group("missing").unwrap();
        assert!(missing.is_none());

        let update = RawDocument(group_write("base", "<new/>"));
        coordinator.send_transaction(Some("base"), &update).unwrap();
        let fresh = RawDocument(group_write("fresh", ""));
        coordinator.send_transaction(None, &fresh).unwrap();

        assert!(!coordinator.read_group_raw("base").delete.is_empty());
        assert!(coordinator.read_group_raw("fresh").delete.is_empty());
        assert!(!coordinator.read_group_raw("fresh").write.is_empty());
    }
}
