//! Arena-scoped session: the root object an embedding application creates
//! once and tears down explicitly, owning every [`Agent`] and
//! [`crate::mcp::McpClient`] it spawns.
//!
//! Grounded on spec.md §3/§4.1-§4.2 and `agentc.c`'s session lifecycle: one
//! [`Arena`] per session, `close` destroys registered children in reverse
//! creation order before resetting the arena. `Arena` allocation itself is
//! not on the hot path for any business object here (see `DESIGN.md`'s Open
//! Question on arena usage) — it's exercised directly by callers that want
//! a bounded scratch buffer, and by the session's own budget bookkeeping.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent::Agent;
use crate::arena::Arena;
use crate::mcp::McpClient;

/// Owns an [`Arena`] plus every [`Agent`]/[`McpClient`] created under it.
///
/// `close` (the explicit teardown entry point, mirroring
/// [`crate::http_pool::HttpPool::shutdown`]'s "async cleanup has its own
/// method, not `Drop`" pattern) must be called before the session is
/// dropped; `Drop` only logs a warning if children are still registered,
/// since disconnecting an MCP client is inherently async and can't run
/// inside a synchronous destructor.
pub struct Session {
    arena: Arena,
    agents: Mutex<Vec<Arc<Agent>>>,
    mcp_clients: Mutex<Vec<Arc<McpClient>>>,
}

impl Session {
    /// Creates a session with an arena of the given byte capacity.
    pub fn new(arena_capacity: usize) -> Self {
        Self {
            arena: Arena::new(arena_capacity),
            agents: Mutex::new(Vec::new()),
            mcp_clients: Mutex::new(Vec::new()),
        }
    }

    /// The session's scratch arena, for callers that want a bounded
    /// allocation budget outside the agent/tool object graph.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Registers an agent as owned by this session, so `close` tears it
    /// down (in LIFO order) along with everything else.
    pub async fn register_agent(&self, agent: Arc<Agent>) {
        self.agents.lock().await.push(agent);
    }

    /// Registers an MCP client as owned by this session.
    pub async fn register_mcp_client(&self, client: Arc<McpClient>) {
        self.mcp_clients.lock().await.push(client);
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.lock().await.len()
    }

    pub async fn mcp_client_count(&self) -> usize {
        self.mcp_clients.lock().await.len()
    }

    /// Destroys registered agents in reverse creation order, disconnects
    /// registered MCP clients (also reverse order), then resets the arena.
    /// Idempotent: calling it twice is a no-op the second time.
    pub async fn close(&self) {
        let mut agents = self.agents.lock().await;
        while let Some(agent) = agents.pop() {
            drop(agent);
        }
        drop(agents);

        let mut clients = self.mcp_clients.lock().await;
        while let Some(client) = clients.pop() {
            client.disconnect().await;
        }
        drop(clients);

        self.arena.reset();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort: if `close` wasn't called, at least flag it loudly.
        // We can't `.await` an MCP disconnect here, so this is a diagnostic
        // net, not a substitute for calling `close`.
        if let Ok(agents) = self.agents.try_lock() {
            if !agents.is_empty() {
                log::warn!(
                    "Session dropped with {} agent(s) still registered; call Session::close first",
                    agents.len()
                );
            }
        }
        if let Ok(clients) = self.mcp_clients.try_lock() {
            if !clients.is_empty() {
                log::warn!(
                    "Session dropped with {} MCP client(s) still connected; call Session::close first",
                    clients.len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_session_has_no_children() {
        let session = Session::new(4096);
        assert_eq!(session.agent_count().await, 0);
        assert_eq!(session.mcp_client_count().await, 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let session = Session::new(4096);
        session.close().await;
        session.close().await;
        assert_eq!(session.agent_count().await, 0);
    }

    #[tokio::test]
    async fn close_resets_the_arena() {
        let session = Session::new(4096);
        session.arena().alloc(100).unwrap();
        assert!(session.arena().used() > 0);
        session.close().await;
        assert_eq!(session.arena().used(), 0);
    }
}
