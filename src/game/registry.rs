//! Connection registry - which session holds which player identity

use std::collections::HashMap;

use rand::Rng;

use super::{PlayerId, SessionId};

/// Longest accepted display name, in characters
pub const MAX_NAME_CHARS: usize = 32;

/// Random suffix attempts before falling back to a counter
const SUFFIX_ATTEMPTS: usize = 64;

/// Maps live sessions to the identities they hold
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_session: HashMap<SessionId, PlayerId>,
    by_player: HashMap<PlayerId, SessionId>,
    fallback_counter: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a unique identity derived from `requested` to `session`.
    /// Returns the identity and the truncated name it was derived from.
    /// A session that already holds an identity keeps it.
    pub fn join<R: Rng>(
        &mut self,
        session: SessionId,
        requested: &str,
        rng: &mut R,
    ) -> (PlayerId, String) {
        let base = truncate_name(requested);
        if let Some(existing) = self.by_session.get(&session) {
            return (existing.clone(), base);
        }

        let id = self.resolve_unique(&base, rng);
        self.by_session.insert(session, id.clone());
        self.by_player.insert(id.clone(), session);
        (id, base)
    }

    fn resolve_unique<R: Rng>(&mut self, base: &str, rng: &mut R) -> PlayerId {
        if !self.is_held(base) {
            return base.to_string();
        }
        for _ in 0..SUFFIX_ATTEMPTS {
            let candidate = format!("{}_{}", base, rng.gen_range(0..1000));
            if !self.is_held(&candidate) {
                return candidate;
            }
        }
        loop {
            self.fallback_counter += 1;
            let candidate = format!("{}_{}", base, 1000 + self.fallback_counter);
            if !self.is_held(&candidate) {
                return candidate;
            }
        }
    }

    /// Release the identity owned by `session`
    pub fn leave(&mut self, session: &SessionId) -> Option<PlayerId> {
        let id = self.by_session.remove(session)?;
        self.by_player.remove(&id);
        Some(id)
    }

    /// Release an identity regardless of session (elimination)
    pub fn release(&mut self, id: &str) -> Option<SessionId> {
        let session = self.by_player.remove(id)?;
        self.by_session.remove(&session);
        Some(session)
    }

    pub fn is_held(&self, id: &str) -> bool {
        self.by_player.contains_key(id)
    }

    pub fn session_of(&self, id: &str) -> Option<SessionId> {
        self.by_player.get(id).copied()
    }

    pub fn player_of(&self, session: &SessionId) -> Option<&PlayerId> {
        self.by_session.get(session)
    }

    /// Does `session` own identity `id`
    pub fn owns(&self, session: &SessionId, id: &str) -> bool {
        self.by_session.get(session).is_some_and(|held| held == id)
    }

    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}

/// Cut a requested name to `MAX_NAME_CHARS` characters
pub fn truncate_name(requested: &str) -> String {
    requested.chars().take(MAX_NAME_CHARS).collect()
}
