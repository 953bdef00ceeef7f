use super::connection::WeakConnection;
use super::LdapRequest;
use crate::ldap::{LdapResult, MessageId, Response, ResultCode};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// A completed request whose result code is exceptional. The full result,
/// including any response controls, is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResult<R> {
    result: R,
}

impl<R: Response> ErrorResult<R> {
    pub fn new(result: R) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &R {
        &self.result
    }

    pub fn into_result(self) -> R {
        self.result
    }

    pub fn result_code(&self) -> ResultCode {
        self.result.result_code()
    }
}

impl<R: Response> fmt::Display for ErrorResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.result.result();
        write!(f, "{}", core.result_code)?;
        if !core.diagnostic_message.is_empty() {
            write!(f, ": {}", core.diagnostic_message)?;
        }
        if let Some(cause) = &core.cause {
            write!(f, " (cause: {})", cause)?;
        }
        Ok(())
    }
}

impl<R: Response + fmt::Debug> std::error::Error for ErrorResult<R> {}

/// Success for non-exceptional result codes, [`ErrorResult`] otherwise.
pub type Outcome<R> = Result<R, ErrorResult<R>>;

/// Callback receiving the outcome of one request. Runs on the connection's
/// handler executor.
pub type ResultHandler<R> = Box<dyn FnOnce(Outcome<R>) + Send + Sync + 'static>;

pub(crate) fn into_outcome<R: Response>(result: R) -> Outcome<R> {
    if result.result_code().is_exceptional() {
        Err(ErrorResult::new(result))
    } else {
        Ok(result)
    }
}

/// Caller-facing handle on an outstanding request.
pub struct ResultFuture<Q: LdapRequest> {
    message_id: MessageId,
    request: Arc<Q>,
    receiver: oneshot::Receiver<Outcome<Q::Result>>,
    connection: WeakConnection,
}

impl<Q: LdapRequest> ResultFuture<Q> {
    pub(crate) fn new(
        message_id: MessageId,
        request: Arc<Q>,
        receiver: oneshot::Receiver<Outcome<Q::Result>>,
        connection: WeakConnection,
    ) -> Self {
        Self {
            message_id,
            request,
            receiver,
            connection,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn request(&self) -> &Q {
        &self.request
    }

    /// Cancels the request if it is still outstanding. Returns `false` when a
    /// result was already delivered or the connection is gone.
    pub fn cancel(&self) -> bool {
        self.connection
            .upgrade()
            .map_or(false, |connection| connection.cancel(self.message_id))
    }

    /// Blocks the current thread until the outcome is available. Must not be
    /// called from inside an async task.
    pub fn wait(self) -> Outcome<Q::Result> {
        futures::executor::block_on(self)
    }
}

impl<Q: LdapRequest> Future for ResultFuture<Q> {
    type Output = Outcome<Q::Result>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The pending record was dropped with the connection.
            Poll::Ready(Err(_)) => {
                let result = self.request.error_result(
                    LdapResult::error(
                        ResultCode::ClientSideServerDown,
                        "The connection was dropped before a result was received".to_string(),
                    )
                    .with_cause("pending request discarded"),
                );
                Poll::Ready(Err(ErrorResult::new(result)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<Q: LdapRequest> fmt::Debug for ResultFuture<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultFuture")
            .field("message_id", &self.message_id)
            .field("operation", &self.request.operation_name())
            .finish()
    }
}
