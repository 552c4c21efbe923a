//! Scripted HTTP transport for acceptance client scenarios.

use async_trait::async_trait;
use exam_acceptance::{BoxError, HttpTransport, Method, RestRequest, RestResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a status.
    Status(u16),
    /// Fail at the transport level.
    Refuse(String),
}

/// Replays scripted replies in order, then keeps answering 404.
#[derive(Debug, Default)]
pub struct ScriptedServer {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedServer {
    /// Creates a server with a script.
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a server that answers 404 `count` times and then `status`.
    pub fn ready_after(count: usize, status: u16) -> Self {
        Self::new(
            std::iter::repeat_n(Reply::Status(404), count).chain([Reply::Status(status)]),
        )
    }

    /// Requests received as `(method, path)`.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedServer {
    async fn send(&self, method: Method, request: &RestRequest) -> Result<RestResponse, BoxError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), request.path.clone()));
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Status(status)) => Ok(RestResponse::with_status(status)),
            Some(Reply::Refuse(message)) => Err(message.into()),
            None => Ok(RestResponse::with_status(404)),
        }
    }
}
