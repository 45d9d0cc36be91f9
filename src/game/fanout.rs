//! Broadcast fanout - per-session ordered outbound queues

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::ws::protocol::ServerMsg;

use super::SessionId;

/// Serialized outbound text frame, shared across sessions
pub type Frame = Arc<str>;

/// Outbound queue depth per session
pub const SESSION_QUEUE_CAPACITY: usize = 256;

/// Delivery errors for a single session
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("unknown session")]
    UnknownSession,

    #[error("session queue full")]
    Full,

    #[error("session closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Registered sessions and their outbound queues
#[derive(Debug, Default)]
pub struct Fanout {
    sessions: HashMap<SessionId, mpsc::Sender<Frame>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, session: SessionId, outbound: mpsc::Sender<Frame>) {
        self.sessions.insert(session, outbound);
    }

    pub fn unregister(&mut self, session: &SessionId) -> bool {
        self.sessions.remove(session).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn encode(msg: &ServerMsg) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(msg).map(Frame::from)
    }

    /// Deliver to one session
    pub fn send_to(&mut self, session: &SessionId, msg: &ServerMsg) -> Result<(), FanoutError> {
        let frame = Self::encode(msg)?;
        let outbound = self
            .sessions
            .get(session)
            .ok_or(FanoutError::UnknownSession)?;
        match outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(FanoutError::Full),
            Err(TrySendError::Closed(_)) => {
                self.sessions.remove(session);
                Err(FanoutError::Closed)
            }
        }
    }

    /// Encode once and deliver to every open session except `exclude`.
    /// Returns how many sessions accepted the frame.
    pub fn broadcast(&mut self, msg: &ServerMsg, exclude: Option<SessionId>) -> usize {
        let frame = match Self::encode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        for (session, outbound) in &self.sessions {
            if Some(*session) == exclude {
                continue;
            }
            match outbound.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(session_id = %session, "Outbound queue full, dropping frame");
                }
                Err(TrySendError::Closed(_)) => closed.push(*session),
            }
        }

        for session in closed {
            debug!(session_id = %session, "Dropping closed session from fanout");
            self.sessions.remove(&session);
        }

        delivered
    }
}
