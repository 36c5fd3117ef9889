use std::time::Duration;

use killfeed_domain::SourceError;
use ssh2::{MethodType, Session};

/// Algorithm preferences offered during the handshake. Hosts that only speak
/// older suites are reached by falling through the list in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportProfile {
    pub name: &'static str,
    pub kex: Option<&'static str>,
    pub host_key: Option<&'static str>,
    pub ciphers: Option<&'static str>,
}

pub const TRANSPORT_PROFILES: [TransportProfile; 3] = [
    TransportProfile {
        name: "modern",
        kex: None,
        host_key: None,
        ciphers: None,
    },
    TransportProfile {
        name: "compat",
        kex: Some(
            "diffie-hellman-group14-sha256,diffie-hellman-group-exchange-sha256,diffie-hellman-group14-sha1",
        ),
        host_key: Some("rsa-sha2-256,rsa-sha2-512,ssh-rsa,ssh-ed25519"),
        ciphers: Some("aes128-ctr,aes192-ctr,aes256-ctr,aes128-cbc,aes256-cbc"),
    },
    TransportProfile {
        name: "legacy",
        kex: Some("diffie-hellman-group14-sha1,diffie-hellman-group1-sha1"),
        host_key: Some("ssh-rsa,ssh-dss"),
        ciphers: Some("aes128-cbc,3des-cbc,aes256-cbc"),
    },
];

impl TransportProfile {
    pub fn apply(&self, session: &Session) -> Result<(), ssh2::Error> {
        if let Some(kex) = self.kex {
            session.method_pref(MethodType::Kex, kex)?;
        }
        if let Some(host_key) = self.host_key {
            session.method_pref(MethodType::HostKey, host_key)?;
        }
        if let Some(ciphers) = self.ciphers {
            session.method_pref(MethodType::CryptCs, ciphers)?;
            session.method_pref(MethodType::CryptSc, ciphers)?;
        }
        Ok(())
    }
}

/// Profile indices to try, starting with the one that last worked for the host.
pub fn profile_order(preferred: Option<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..TRANSPORT_PROFILES.len()).collect();
    if let Some(idx) = preferred.filter(|idx| *idx < TRANSPORT_PROFILES.len()) {
        order.retain(|i| *i != idx);
        order.insert(0, idx);
    }
    order
}

/// Delay before retry `attempt` (zero-based): base, 2x base, 4x base... capped at 30s.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(base_ms.saturating_mul(factor).min(30_000))
}

/// Runs `work` up to `attempts` times, sleeping with backoff between tries.
/// Only transient errors are retried; `on_failure` sees each of them before
/// the next try.
pub fn retry_transient<T>(
    attempts: u32,
    base_ms: u64,
    mut work: impl FnMut(u32) -> Result<T, SourceError>,
    mut on_failure: impl FnMut(u32, &SourceError),
) -> Result<T, SourceError> {
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        match work(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                on_failure(attempt, &err);
                attempt += 1;
                if attempt >= attempts {
                    return Err(err);
                }
                std::thread::sleep(backoff_delay(base_ms, attempt - 1));
            }
            Err(err) => return Err(err),
        }
    }
}

/// Tries each profile in `order` until one handshakes. A terminal error
/// (bad credentials, bad configuration) stops the fallthrough, since no
/// other algorithm suite can fix it.
pub fn first_accepted_profile<T>(
    order: &[usize],
    mut handshake: impl FnMut(usize) -> Result<T, SourceError>,
) -> Result<(usize, T), SourceError> {
    let mut last_err = SourceError::Connection("no transport profile to try".to_string());
    for &idx in order {
        match handshake(idx) {
            Ok(value) => return Ok((idx, value)),
            Err(err) if err.is_terminal() => return Err(err),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_working_profile_is_tried_first() {
        assert_eq!(profile_order(None), vec![0, 1, 2]);
        assert_eq!(profile_order(Some(2)), vec![2, 0, 1]);
        assert_eq!(profile_order(Some(9)), vec![0, 1, 2]);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1_000, 0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1_000, 1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(1_000, 2), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(1_000, 10), Duration::from_secs(30));
    }

    #[test]
    fn authentication_failure_is_tried_once() {
        let mut calls = 0;
        let result: Result<(), _> = retry_transient(
            5,
            0,
            |_| {
                calls += 1;
                Err(SourceError::Authentication("denied".into()))
            },
            |_, _| {},
        );
        assert!(matches!(result, Err(SourceError::Authentication(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn transient_failure_uses_every_attempt() {
        let mut calls = 0;
        let mut seen = Vec::new();
        let result: Result<(), _> = retry_transient(
            3,
            0,
            |_| {
                calls += 1;
                Err(SourceError::Timeout("read".into()))
            },
            |attempt, _| seen.push(attempt),
        );
        assert!(matches!(result, Err(SourceError::Timeout(_))));
        assert_eq!(calls, 3);
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn retry_stops_at_first_success() {
        let value = retry_transient(
            4,
            0,
            |attempt| {
                if attempt < 2 {
                    Err(SourceError::Connection("reset".into()))
                } else {
                    Ok(attempt)
                }
            },
            |_, _| {},
        )
        .expect("third try succeeds");
        assert_eq!(value, 2);
    }

    #[test]
    fn rejected_profile_falls_through_to_the_next() {
        let mut tried = Vec::new();
        let (idx, name) = first_accepted_profile(&profile_order(None), |idx| {
            tried.push(idx);
            if idx == 0 {
                Err(SourceError::Connection("kex mismatch".into()))
            } else {
                Ok(TRANSPORT_PROFILES[idx].name)
            }
        })
        .expect("compat accepted");
        assert_eq!((idx, name), (1, "compat"));
        assert_eq!(tried, vec![0, 1]);
    }

    #[test]
    fn terminal_error_stops_the_fallthrough() {
        let mut tried = Vec::new();
        let result: Result<(usize, ()), _> = first_accepted_profile(&[0, 1, 2], |idx| {
            tried.push(idx);
            Err(SourceError::Authentication("denied".into()))
        });
        assert!(matches!(result, Err(SourceError::Authentication(_))));
        assert_eq!(tried, vec![0]);
    }

    #[test]
    fn every_profile_rejected_reports_the_last_error() {
        let result: Result<(usize, ()), _> = first_accepted_profile(&[0, 1, 2], |idx| {
            Err(SourceError::Connection(format!("profile {} rejected", idx)))
        });
        assert_eq!(result.expect_err("all rejected"), SourceError::Connection("profile 2 rejected".into()));
    }
}
