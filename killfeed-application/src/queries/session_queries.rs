use killfeed_domain::{GuildId, PlayerSession, PresenceCounts, ServerId};
use serde::Serialize;

use crate::{AppError, AppState};

#[derive(Debug, Clone, Serialize)]
pub struct SessionsView {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub counts: PresenceCounts,
    pub sessions: Vec<PlayerSession>,
}

pub async fn list_sessions(
    state: &AppState,
    guild_id: GuildId,
    server_id: &ServerId,
    include_offline: bool,
) -> Result<SessionsView, AppError> {
    let mut sessions = state.session_repo.list_sessions(guild_id, server_id).await?;
    let counts = PresenceCounts::from_sessions(&sessions);
    if !include_offline {
        sessions.retain(|session| session.state.is_present());
    }
    sessions.sort_by(|a, b| b.last_transition_at.cmp(&a.last_transition_at));
    Ok(SessionsView {
        guild_id,
        server_id: server_id.clone(),
        counts,
        sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::run_presence_pass;
    use crate::testing::{connect_line, disconnect_line, Harness};

    #[tokio::test]
    async fn offline_sessions_are_hidden_by_default() {
        let harness = Harness::new();
        harness.remote.put(
            &harness.live_log(),
            &[connect_line(0, 1, "aaa"), connect_line(0, 2, "bbb")].concat(),
        );
        run_presence_pass(&harness.state, &harness.source).await.expect("cold");
        harness.remote.append(&harness.live_log(), &disconnect_line(0, 3, "bbb"));
        run_presence_pass(&harness.state, &harness.source).await.expect("hot");

        let key = harness.source.key();
        let view = list_sessions(&harness.state, key.guild_id, &key.server_id, false)
            .await
            .expect("view");
        assert_eq!(view.sessions.len(), 1);
        assert_eq!(view.counts.online, 1);

        let all = list_sessions(&harness.state, key.guild_id, &key.server_id, true)
            .await
            .expect("view");
        assert_eq!(all.sessions.len(), 2);
    }
}
