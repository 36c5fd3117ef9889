// Remote game server identity, owned by external configuration

use serde::{Deserialize, Serialize};

use crate::errors::SourceError;
use crate::value_objects::{GuildId, ServerId, ServerKey};

pub const DEFAULT_LIVE_LOG_TEMPLATE: &str = "./{host}_{server_id}/Logs/Deadside.log";
pub const DEFAULT_KILL_LOG_DIR_TEMPLATE: &str = "./{host}_{server_id}/actual1/deathlogs";
pub const DEFAULT_KILL_LOG_PATTERN: &str = "*.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSource {
    pub guild_id: GuildId,
    pub server_id: ServerId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// `env:NAME` or a literal secret; resolved by the remote reader.
    pub credential_ref: String,
    pub live_log_template: String,
    pub kill_log_dir_template: String,
    pub kill_log_pattern: String,
}

impl ServerSource {
    pub fn key(&self) -> ServerKey {
        ServerKey::new(self.guild_id, self.server_id.clone())
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.server_id.as_str()
        } else {
            &self.name
        }
    }

    pub fn live_log_path(&self) -> String {
        self.render(&self.live_log_template)
    }

    pub fn kill_log_dir(&self) -> String {
        let rendered = self.render(&self.kill_log_dir_template);
        rendered.trim_end_matches('/').to_string()
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        if self.host.trim().is_empty() {
            return Err(SourceError::Configuration(format!(
                "server {} has no host",
                self.key()
            )));
        }
        if self.username.trim().is_empty() {
            return Err(SourceError::Configuration(format!(
                "server {} has no username",
                self.key()
            )));
        }
        if self.live_log_template.trim().is_empty() || self.kill_log_dir_template.trim().is_empty() {
            return Err(SourceError::Configuration(format!(
                "server {} is missing a remote path template",
                self.key()
            )));
        }
        Ok(())
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{host}", self.host.trim())
            .replace("{server_id}", self.server_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ServerSource {
        ServerSource {
            guild_id: GuildId(1),
            server_id: ServerId::new("7020"),
            name: String::new(),
            host: "10.0.0.5".to_string(),
            port: 8822,
            username: "ops".to_string(),
            credential_ref: "env:SFTP_PASSWORD".to_string(),
            live_log_template: DEFAULT_LIVE_LOG_TEMPLATE.to_string(),
            kill_log_dir_template: format!("{}/", DEFAULT_KILL_LOG_DIR_TEMPLATE),
            kill_log_pattern: DEFAULT_KILL_LOG_PATTERN.to_string(),
        }
    }

    #[test]
    fn paths_are_derived_from_host_and_server() {
        let source = source();
        assert_eq!(source.live_log_path(), "./10.0.0.5_7020/Logs/Deadside.log");
        assert_eq!(source.kill_log_dir(), "./10.0.0.5_7020/actual1/deathlogs");
        assert_eq!(source.display_name(), "7020");
    }

    #[test]
    fn missing_host_is_a_configuration_error() {
        let mut source = source();
        source.host = " ".to_string();
        let err = source.validate().expect_err("reject");
        assert!(err.is_terminal());
    }
}
