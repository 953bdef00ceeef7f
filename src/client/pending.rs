// Per-connection table of requests awaiting a result.

use super::future::{into_outcome, Outcome, ResultHandler};
use super::LdapRequest;
use crate::controls::response_controls;
use crate::ldap::{AuthorizationState, InboundResponse, LdapResult, MessageId, Response, ResultCode};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Type-erased pending request. Consumed by whichever of completion or
/// failure removes it from the table first.
pub(crate) trait PendingOperation: Send + Sync {
    fn message_id(&self) -> MessageId;

    fn operation_name(&self) -> &'static str;

    fn complete(self: Box<Self>, response: &InboundResponse, authorization: &RwLock<AuthorizationState>);

    fn fail(self: Box<Self>, result: LdapResult);
}

pub(crate) struct PendingRequest<Q: LdapRequest> {
    message_id: MessageId,
    request: Arc<Q>,
    handler: Option<ResultHandler<Q::Result>>,
    executor: Handle,
    sender: oneshot::Sender<Outcome<Q::Result>>,
}

impl<Q: LdapRequest> PendingRequest<Q> {
    pub(crate) fn new(
        message_id: MessageId,
        request: Arc<Q>,
        handler: Option<ResultHandler<Q::Result>>,
        executor: Handle,
        sender: oneshot::Sender<Outcome<Q::Result>>,
    ) -> Self {
        Self {
            message_id,
            request,
            handler,
            executor,
            sender,
        }
    }

    fn deliver(self, result: Q::Result) {
        let outcome = into_outcome(result);
        let message_id = self.message_id;
        if let Some(handler) = self.handler {
            let for_handler = outcome.clone();
            self.executor.spawn(async move {
                handler(for_handler);
            });
        }
        if self.sender.send(outcome).is_err() {
            debug!("Result for message {} has no waiting future", message_id);
        }
    }
}

impl<Q: LdapRequest> PendingOperation for PendingRequest<Q> {
    fn message_id(&self) -> MessageId {
        self.message_id
    }

    fn operation_name(&self) -> &'static str {
        self.request.operation_name()
    }

    fn complete(self: Box<Self>, response: &InboundResponse, authorization: &RwLock<AuthorizationState>) {
        let decoded = response_controls()
            .decode_all(&response.controls)
            .and_then(|controls| self.request.decode_result(response, controls));
        let result = match decoded {
            Ok(result) => {
                if !result.result_code().is_exceptional() {
                    self.request.on_success(&result, authorization);
                }
                result
            }
            Err(e) => {
                warn!("Failed to decode result for message {}: {}", self.message_id, e);
                self.request.error_result(
                    LdapResult::error(
                        ResultCode::ClientSideDecodingError,
                        format!("Cannot decode the response to message {}", self.message_id),
                    )
                    .with_cause(e.to_string()),
                )
            }
        };
        (*self).deliver(result);
    }

    fn fail(self: Box<Self>, result: LdapResult) {
        let result = self.request.error_result(result);
        (*self).deliver(result);
    }
}

pub(crate) struct PendingTable {
    entries: DashMap<MessageId, Box<dyn PendingOperation>>,
    closed: AtomicBool,
    // Reserved slots, including inserts still in flight.
    reserved: AtomicUsize,
    max_pending: usize,
}

impl PendingTable {
    /// `max_pending` of zero means unbounded.
    pub(crate) fn new(max_pending: usize) -> Self {
        Self {
            entries: DashMap::new(),
            closed: AtomicBool::new(false),
            reserved: AtomicUsize::new(0),
            max_pending,
        }
    }

    /// Adds a record. The record is handed back if the table is closed or full.
    pub(crate) fn insert(&self, operation: Box<dyn PendingOperation>) -> Result<(), Box<dyn PendingOperation>> {
        if self.is_closed() || !self.reserve() {
            return Err(operation);
        }
        let message_id = operation.message_id();
        if let Some(previous) = self.entries.insert(message_id, operation) {
            self.release();
            warn!("Replaced pending request with duplicate message ID {}", message_id);
            previous.fail(LdapResult::error(
                ResultCode::ClientSideLocalError,
                format!("Message ID {} was reused", message_id),
            ));
        }
        // A close that raced with this insert may have missed the new entry.
        if self.is_closed() {
            if let Some(operation) = self.remove(message_id) {
                return Err(operation);
            }
        }
        Ok(())
    }

    fn reserve(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (self.max_pending == 0 || n < self.max_pending).then(|| n + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.reserved.fetch_sub(1, Ordering::AcqRel);
    }

    /// Atomically takes the record for `message_id`. At most one caller gets it.
    pub(crate) fn remove(&self, message_id: MessageId) -> Option<Box<dyn PendingOperation>> {
        let (_, operation) = self.entries.remove(&message_id)?;
        self.release();
        Some(operation)
    }

    pub(crate) fn contains(&self, message_id: MessageId) -> bool {
        self.entries.contains_key(&message_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Refuses further inserts and drains every record in message-ID order.
    pub(crate) fn close(&self) -> Vec<Box<dyn PendingOperation>> {
        self.closed.store(true, Ordering::Release);
        let mut ids: Vec<MessageId> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }
}
