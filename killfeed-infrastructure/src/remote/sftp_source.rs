use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glob::Pattern;
use ssh2::{ErrorCode, Session, Sftp};
use tracing::{debug, info, warn};

use killfeed_domain::ports::{RemoteEntry, RemoteSource, RemoteText};
use killfeed_domain::{RemoteConfig, ServerKey, ServerSource, SourceError};

use crate::remote::credentials::resolve_credential;
use crate::remote::encoding::{complete_line_len, TextDecoder};
use crate::remote::transport::{first_accepted_profile, profile_order, retry_transient, TRANSPORT_PROFILES};

// libssh2 error codes
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_NO_SUCH_PATH: i32 = 10;

struct Connection {
    session: Session,
    sftp: Sftp,
    profile: usize,
}

/// SFTP reader. One connection per (guild, server) is kept open between
/// ticks; every call blocks and is expected to run on the worker pool.
pub struct SftpRemoteSource {
    config: RemoteConfig,
    decoder: TextDecoder,
    connections: Mutex<HashMap<ServerKey, Arc<Mutex<Connection>>>>,
    preferred_profiles: Mutex<HashMap<ServerKey, usize>>,
}

impl SftpRemoteSource {
    pub fn new(config: RemoteConfig) -> anyhow::Result<Self> {
        let decoder = TextDecoder::new(&config.encodings)?;
        Ok(Self {
            config,
            decoder,
            connections: Mutex::new(HashMap::new()),
            preferred_profiles: Mutex::new(HashMap::new()),
        })
    }

    pub fn open_connections(&self) -> usize {
        self.connections.lock().map(|map| map.len()).unwrap_or(0)
    }

    fn with_retry<T>(
        &self,
        source: &ServerSource,
        op: &str,
        mut work: impl FnMut(&Sftp) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        source.validate()?;
        let key = source.key();
        retry_transient(
            self.config.retry_attempts,
            self.config.retry_base_ms,
            |attempt| {
                if attempt > 0 {
                    debug!(server = %key, op, attempt, "retrying remote operation");
                }
                let conn = self.connection(source)?;
                let guard = conn
                    .lock()
                    .map_err(|_| SourceError::Connection("connection lock poisoned".to_string()))?;
                work(&guard.sftp)
            },
            |attempt, err| {
                warn!(server = %key, op, attempt, error = %err, "remote operation failed");
                self.close(&key);
            },
        )
    }

    fn connection(&self, source: &ServerSource) -> Result<Arc<Mutex<Connection>>, SourceError> {
        let key = source.key();
        if let Some(existing) = self
            .connections
            .lock()
            .ok()
            .and_then(|map| map.get(&key).cloned())
        {
            return Ok(existing);
        }
        let connection = Arc::new(Mutex::new(self.connect(source)?));
        if let Ok(mut map) = self.connections.lock() {
            map.insert(key, connection.clone());
        }
        Ok(connection)
    }

    fn connect(&self, source: &ServerSource) -> Result<Connection, SourceError> {
        let key = source.key();
        let password = resolve_credential(&source.credential_ref)?;
        let preferred = self
            .preferred_profiles
            .lock()
            .ok()
            .and_then(|map| map.get(&key).copied());

        let (idx, connection) = first_accepted_profile(&profile_order(preferred), |idx| {
            self.handshake(source, idx, &password).map_err(|err| {
                if !err.is_terminal() {
                    debug!(server = %key, profile = TRANSPORT_PROFILES[idx].name, error = %err, "transport profile rejected");
                }
                err
            })
        })?;
        if preferred != Some(idx) {
            info!(server = %key, host = %source.host, profile = TRANSPORT_PROFILES[idx].name, "sftp connected");
            if let Ok(mut map) = self.preferred_profiles.lock() {
                map.insert(key, idx);
            }
        }
        Ok(connection)
    }

    fn handshake(&self, source: &ServerSource, profile: usize, password: &str) -> Result<Connection, SourceError> {
        let timeout = Duration::from_secs(self.config.connect_timeout_seconds.max(1));
        let addr = (source.host.trim(), source.port)
            .to_socket_addrs()
            .map_err(|err| map_io_error(&source.host, err))?
            .next()
            .ok_or_else(|| SourceError::Connection(format!("{} did not resolve", source.host)))?;
        let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|err| map_io_error(&source.host, err))?;
        tcp.set_read_timeout(Some(timeout))
            .map_err(|err| map_io_error(&source.host, err))?;

        let mut session = Session::new().map_err(|err| map_ssh_error(&source.host, err))?;
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        TRANSPORT_PROFILES[profile]
            .apply(&session)
            .map_err(|err| map_ssh_error(&source.host, err))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|err| map_ssh_error(&source.host, err))?;
        session
            .userauth_password(source.username.trim(), password)
            .map_err(|err| map_ssh_error(&source.host, err))?;
        if !session.authenticated() {
            return Err(SourceError::Authentication(format!(
                "{} rejected user {}",
                source.host, source.username
            )));
        }
        let sftp = session.sftp().map_err(|err| map_ssh_error(&source.host, err))?;
        Ok(Connection {
            session,
            sftp,
            profile,
        })
    }

    fn read_range(&self, sftp: &Sftp, path: &str, offset: u64, len: u64) -> Result<Vec<u8>, SourceError> {
        let mut file = sftp
            .open(Path::new(path))
            .map_err(|err| map_ssh_error(path, err))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(|err| map_io_error(path, err))?;
        }
        let mut bytes = Vec::with_capacity(len.min(16 * 1024 * 1024) as usize);
        file.take(len)
            .read_to_end(&mut bytes)
            .map_err(|err| map_io_error(path, err))?;
        Ok(bytes)
    }
}

impl RemoteSource for SftpRemoteSource {
    fn fetch(&self, source: &ServerSource, path: &str) -> Result<RemoteText, SourceError> {
        let bytes = self.with_retry(source, "fetch", |sftp| {
            let size = file_size(sftp, path)?;
            self.read_range(sftp, path, 0, size)
        })?;
        let size = bytes.len() as u64;
        let (text, encoding) = self.decoder.decode(path, &bytes)?;
        Ok(RemoteText {
            path: path.to_string(),
            text,
            start_offset: 0,
            end_offset: size,
            file_size: size,
            encoding: encoding.to_string(),
        })
    }

    fn fetch_from(&self, source: &ServerSource, path: &str, offset: u64) -> Result<RemoteText, SourceError> {
        let (bytes, size) = self.with_retry(source, "fetch_from", |sftp| {
            let size = file_size(sftp, path)?;
            if size <= offset {
                return Ok((Vec::new(), size));
            }
            Ok((self.read_range(sftp, path, offset, size - offset)?, size))
        })?;
        let complete = complete_line_len(&bytes);
        if complete == 0 {
            return Ok(RemoteText::empty(path, offset, size));
        }
        let (text, encoding) = self.decoder.decode(path, &bytes[..complete])?;
        Ok(RemoteText {
            path: path.to_string(),
            text,
            start_offset: offset,
            end_offset: offset + complete as u64,
            file_size: size,
            encoding: encoding.to_string(),
        })
    }

    fn list(&self, source: &ServerSource, dir: &str, pattern: &str) -> Result<Vec<RemoteEntry>, SourceError> {
        let matcher = Pattern::new(pattern)
            .map_err(|err| SourceError::Configuration(format!("bad glob '{}': {}", pattern, err)))?;
        let listing = self.with_retry(source, "list", |sftp| {
            sftp.readdir(Path::new(dir))
                .map_err(|err| map_ssh_error(dir, err))
        })?;
        let entries = listing
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .filter_map(|(path, stat)| {
                let name = path.file_name()?.to_string_lossy().to_string();
                Some(RemoteEntry {
                    path: join_remote(dir, &name),
                    name,
                    size: stat.size.unwrap_or(0),
                    modified_at: stat.mtime.map(|secs| secs as i64 * 1000),
                })
            })
            .collect();
        Ok(filter_entries(entries, &matcher))
    }

    fn close(&self, key: &ServerKey) {
        let removed = self
            .connections
            .lock()
            .ok()
            .and_then(|mut map| map.remove(key));
        if let Some(connection) = removed {
            shutdown(key, &connection);
        }
    }

    fn close_all(&self) {
        let drained: Vec<(ServerKey, Arc<Mutex<Connection>>)> = match self.connections.lock() {
            Ok(mut map) => map.drain().collect(),
            Err(_) => Vec::new(),
        };
        for (key, connection) in &drained {
            shutdown(key, connection);
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "closed sftp connections");
        }
    }
}

/// Sends SSH_MSG_DISCONNECT before the session is dropped.
fn shutdown(key: &ServerKey, connection: &Mutex<Connection>) {
    let Ok(conn) = connection.lock() else {
        warn!(server = %key, "connection lock poisoned, dropping without disconnect");
        return;
    };
    if let Err(err) = conn.session.disconnect(None, "shutdown", None) {
        warn!(server = %key, error = %err, "sftp disconnect failed");
    }
    debug!(server = %key, profile = TRANSPORT_PROFILES[conn.profile].name, "sftp connection closed");
}

fn file_size(sftp: &Sftp, path: &str) -> Result<u64, SourceError> {
    let stat = sftp
        .stat(Path::new(path))
        .map_err(|err| map_ssh_error(path, err))?;
    Ok(stat.size.unwrap_or(0))
}

fn filter_entries(mut entries: Vec<RemoteEntry>, matcher: &Pattern) -> Vec<RemoteEntry> {
    entries.retain(|entry| matcher.matches(&entry.name));
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

fn map_ssh_error(context: &str, err: ssh2::Error) -> SourceError {
    let message = format!("{}: {}", context, err.message());
    match err.code() {
        ErrorCode::Session(LIBSSH2_ERROR_AUTHENTICATION_FAILED)
        | ErrorCode::Session(LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED) => {
            SourceError::Authentication(message)
        }
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => SourceError::Timeout(message),
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) | ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_PATH) => {
            SourceError::NotFound(context.to_string())
        }
        _ => SourceError::Connection(message),
    }
}

fn map_io_error(context: &str, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            SourceError::Timeout(format!("{}: {}", context, err))
        }
        io::ErrorKind::NotFound => SourceError::NotFound(context.to_string()),
        _ => SourceError::Connection(format!("{}: {}", context, err)),
    }
}
