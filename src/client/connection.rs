use super::future::{ResultFuture, ResultHandler};
use super::message_id::MessageIdAllocator;
use super::pending::{PendingOperation, PendingRequest, PendingTable};
use super::LdapRequest;
use crate::config::Config;
use crate::ldap::message::{
    encode_abandon_request, encode_message, peek_message_id, LDAP_EXTENDED_RESPONSE, LDAP_UNBIND_REQUEST,
};
use crate::ldap::{AuthorizationState, InboundResponse, LdapResult, MessageId, ResultCode};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Unsolicited notification sent by a server that is about to close the
/// connection (RFC 4511 section 4.4.1).
pub const OID_NOTICE_OF_DISCONNECTION: &str = "1.3.6.1.4.1.1466.20036";

struct Inner {
    ids: MessageIdAllocator,
    pending: PendingTable,
    authorization: RwLock<AuthorizationState>,
    outbound: mpsc::UnboundedSender<Bytes>,
    executor: Handle,
    default_timeout: Option<Duration>,
}

/// Client side of one LDAP connection: assigns message IDs, tracks pending
/// requests and routes each inbound response to the request that caused it.
///
/// Framing and transport are external. Encoded requests are pushed to the
/// outbound channel and complete PDUs are fed back through
/// [`Connection::handle_inbound`] or [`Connection::drive`].
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Creates a connection with no request timeout and no pending limit.
    /// Handlers run on `executor`.
    pub fn new(outbound: mpsc::UnboundedSender<Bytes>, executor: Handle) -> Self {
        Self::with_limits(outbound, executor, None, 0)
    }

    /// Creates a connection using the timeout and pending limit from `config`.
    /// Returns the receiving end of the outbound PDU channel.
    pub fn from_config(config: &Config, executor: Handle) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Self::with_limits(tx, executor, config.request_timeout(), config.max_pending_requests);
        (connection, rx)
    }

    fn with_limits(
        outbound: mpsc::UnboundedSender<Bytes>,
        executor: Handle,
        default_timeout: Option<Duration>,
        max_pending: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ids: MessageIdAllocator::new(),
                pending: PendingTable::new(max_pending),
                authorization: RwLock::new(AuthorizationState::new()),
                outbound,
                executor,
                default_timeout,
            }),
        }
    }

    /// Sends `request` and returns a future for its result. The optional
    /// handler also receives the outcome.
    ///
    /// Local failures (closed connection, full pending table, writer gone)
    /// are delivered as error results rather than returned here.
    pub fn submit<Q: LdapRequest>(&self, request: Q, handler: Option<ResultHandler<Q::Result>>) -> ResultFuture<Q> {
        self.submit_inner(request, handler, self.inner.default_timeout)
    }

    /// Like [`Connection::submit`], cancelling the request with a timeout
    /// result if no response arrives within `timeout`.
    pub fn submit_with_timeout<Q: LdapRequest>(
        &self,
        request: Q,
        handler: Option<ResultHandler<Q::Result>>,
        timeout: Duration,
    ) -> ResultFuture<Q> {
        self.submit_inner(request, handler, Some(timeout))
    }

    fn submit_inner<Q: LdapRequest>(
        &self,
        request: Q,
        handler: Option<ResultHandler<Q::Result>>,
        timeout: Option<Duration>,
    ) -> ResultFuture<Q> {
        let inner = &self.inner;
        let request = Arc::new(request);
        let message_id = inner.ids.allocate(|id| inner.pending.contains(id));
        let pdu = encode_message(message_id, request.controls(), |writer| request.encode_op(writer));

        let (tx, rx) = oneshot::channel();
        let record = PendingRequest::new(message_id, Arc::clone(&request), handler, inner.executor.clone(), tx);
        let future = ResultFuture::new(message_id, Arc::clone(&request), rx, self.downgrade());

        if let Err(record) = inner.pending.insert(Box::new(record)) {
            let result = if inner.pending.is_closed() {
                LdapResult::error(
                    ResultCode::ClientSideServerDown,
                    "The connection is closed".to_string(),
                )
            } else {
                LdapResult::error(
                    ResultCode::ClientSideLocalError,
                    format!("Too many outstanding requests ({})", inner.pending.len()),
                )
            };
            warn!("Refused {} request {}: {}", request.operation_name(), message_id, result.diagnostic_message);
            record.fail(result);
            return future;
        }

        debug!("Sending {} request {} ({} bytes)", request.operation_name(), message_id, pdu.len());
        if let Err(e) = inner.outbound.send(pdu) {
            error!("Failed to queue request {}: {}", message_id, e);
            if let Some(record) = inner.pending.remove(message_id) {
                record.fail(
                    LdapResult::error(
                        ResultCode::ClientSideServerDown,
                        "The connection writer is no longer running".to_string(),
                    )
                    .with_cause(e.to_string()),
                );
            }
            return future;
        }

        if let Some(timeout) = timeout {
            self.schedule_timeout(message_id, timeout);
        }
        future
    }

    fn schedule_timeout(&self, message_id: MessageId, timeout: Duration) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.executor.spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Some(record) = inner.pending.remove(message_id) {
                warn!(
                    "{} request {} timed out after {:?}",
                    record.operation_name(),
                    message_id,
                    timeout
                );
                send_abandon(&inner, message_id);
                record.fail(LdapResult::error(
                    ResultCode::ClientSideTimeout,
                    format!("No response to message {} within {} ms", message_id, timeout.as_millis()),
                ));
            }
        });
    }

    /// Decodes one complete PDU and routes it. A PDU that cannot be decoded
    /// fails the request it belongs to, when its message ID is readable.
    pub fn handle_inbound(&self, pdu: &[u8]) {
        match InboundResponse::decode(pdu) {
            Ok(response) if response.message_id == 0 => self.handle_unsolicited(response),
            Ok(response) => {
                self.complete(response);
            }
            Err(e) => match peek_message_id(pdu) {
                Some(message_id) => match self.inner.pending.remove(message_id) {
                    Some(record) => {
                        warn!("Failed to decode response to message {}: {}", message_id, e);
                        record.fail(
                            LdapResult::error(
                                ResultCode::ClientSideDecodingError,
                                format!("Cannot decode the response to message {}", message_id),
                            )
                            .with_cause(e.to_string()),
                        );
                    }
                    None => debug!("Discarding undecodable PDU for message {}: {}", message_id, e),
                },
                None => warn!("Discarding undecodable PDU: {}", e),
            },
        }
    }

    fn handle_unsolicited(&self, response: InboundResponse) {
        let is_disconnect = response.op_tag == LDAP_EXTENDED_RESPONSE
            && response.response_name.as_deref() == Some(OID_NOTICE_OF_DISCONNECTION);
        if is_disconnect {
            warn!(
                "Server sent notice of disconnection: {} {}",
                response.result_code, response.diagnostic_message
            );
            self.fail_all(&format!(
                "notice of disconnection: {} {}",
                response.result_code, response.diagnostic_message
            ));
        } else {
            info!(
                "Ignoring unsolicited notification {:?}",
                response.response_name.as_deref().unwrap_or("")
            );
        }
    }

    /// Completes the pending request with the response's message ID. Returns
    /// `false` when no request was waiting for it.
    pub fn complete(&self, response: InboundResponse) -> bool {
        match self.inner.pending.remove(response.message_id) {
            Some(record) => {
                debug!(
                    "Received {} for {} request {}",
                    response.result_code,
                    record.operation_name(),
                    response.message_id
                );
                record.complete(&response, &self.inner.authorization);
                true
            }
            None => {
                debug!("No pending request for message {}", response.message_id);
                false
            }
        }
    }

    /// Cancels an outstanding request and asks the server to abandon it.
    /// Returns `false` when the request already completed.
    pub fn cancel(&self, message_id: MessageId) -> bool {
        match self.inner.pending.remove(message_id) {
            Some(record) => {
                info!("Cancelling {} request {}", record.operation_name(), message_id);
                send_abandon(&self.inner, message_id);
                record.fail(LdapResult::error(
                    ResultCode::ClientSideUserCancelled,
                    format!("Request {} was cancelled", message_id),
                ));
                true
            }
            None => false,
        }
    }

    /// Tears the connection down: refuses new requests and fails every
    /// pending one, in message-ID order, with a server-down result.
    pub fn fail_all(&self, cause: &str) {
        let drained = self.inner.pending.close();
        if !drained.is_empty() {
            info!("Connection closed with {} pending requests: {}", drained.len(), cause);
        }
        for record in drained {
            record.fail(
                LdapResult::error(
                    ResultCode::ClientSideServerDown,
                    "The connection to the server was closed".to_string(),
                )
                .with_cause(cause),
            );
        }
    }

    /// Reads complete PDUs from `stream` until it ends or fails, then tears
    /// the connection down.
    pub async fn drive<S, E>(&self, mut stream: S)
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: fmt::Display,
    {
        while let Some(item) = stream.next().await {
            match item {
                Ok(pdu) => self.handle_inbound(&pdu),
                Err(e) => {
                    error!("Error reading from connection: {}", e);
                    self.fail_all(&e.to_string());
                    return;
                }
            }
        }
        info!("Connection closed by peer");
        self.fail_all("connection closed by peer");
    }

    /// Sends an unbind request, clears the authorization state and tears the
    /// connection down.
    pub fn unbind(&self) {
        let message_id = self.inner.ids.allocate(|id| self.inner.pending.contains(id));
        let pdu = encode_message(message_id, &[], |writer| {
            writer.write_octet_string_with_tag(LDAP_UNBIND_REQUEST, b"");
        });
        if self.inner.outbound.send(pdu).is_err() {
            debug!("Writer already gone while unbinding");
        }
        match self.inner.authorization.write() {
            Ok(mut state) => state.unbind(),
            Err(e) => error!("Failed to acquire authorization lock for unbind: {}", e),
        }
        self.fail_all("unbind");
    }

    /// Snapshot of the identity established by the last successful bind.
    pub fn authorization(&self) -> AuthorizationState {
        match self.inner.authorization.read() {
            Ok(state) => state.clone(),
            Err(e) => {
                error!("Failed to read authorization state: {}", e);
                AuthorizationState::new()
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    pub(crate) fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pending.is_closed()
    }
}

/// Non-owning handle held by result futures, so an outstanding future does
/// not keep the connection alive.
#[derive(Clone)]
pub(crate) struct WeakConnection {
    inner: Weak<Inner>,
}

impl WeakConnection {
    pub(crate) fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let drained = self.pending.close();
        if drained.is_empty() {
            return;
        }
        warn!("Connection dropped with {} pending requests", drained.len());
        for record in drained {
            record.fail(
                LdapResult::error(
                    ResultCode::ClientSideServerDown,
                    "The connection was dropped before a result was received".to_string(),
                )
                .with_cause("connection handle dropped"),
            );
        }
    }
}

fn send_abandon(inner: &Inner, abandoned: MessageId) {
    let message_id = inner.ids.allocate(|id| inner.pending.contains(id));
    if inner.outbound.send(encode_abandon_request(message_id, abandoned)).is_err() {
        debug!("Writer gone, abandon of {} not sent", abandoned);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
