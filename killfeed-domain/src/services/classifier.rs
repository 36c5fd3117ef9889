use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::entities::{ConnectionEvent, LogEvent, WorldEvent, UNKNOWN_PLAYER_NAME};
use crate::value_objects::{parse_line_prefix, PlayerId, Platform, LINE_PREFIX_WIDTH};

const MIN_MISSION_LEVEL: u8 = 3;
const MAX_MISSION_LEVEL: u32 = 5;
const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 32;

/// Raw match of one rule, before the filtering policy runs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Candidate {
    Queue {
        player_id: PlayerId,
        name: String,
        platform: Platform,
    },
    Registered(PlayerId),
    Disconnected(PlayerId),
    Mission { mission_id: String, state: String },
    Airdrop { state: String },
    Helicrash { state: String },
    Trader { trader_id: String, state: String },
    Vehicle {
        added: bool,
        vehicle: String,
        total: u32,
    },
}

struct Rule {
    pattern: Regex,
    extract: fn(&Captures) -> Option<Candidate>,
}

/// Per-pass memory of world object states. Lets a repeated identical switch
/// (logged twice by the game) produce one event.
#[derive(Debug, Default, Clone)]
pub struct ClassifierContext {
    last_states: HashMap<(&'static str, String), String>,
}

impl ClassifierContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `state` repeats the last state seen for the object.
    fn observe(&mut self, kind: &'static str, object_id: &str, state: &str) -> bool {
        let key = (kind, object_id.to_string());
        match self.last_states.get(&key) {
            Some(previous) if previous == state => false,
            _ => {
                self.last_states.insert(key, state.to_string());
                true
            }
        }
    }
}

pub struct Classifier {
    rules: Vec<Rule>,
    mission_level: Regex,
    digit_run: Regex,
}

impl Classifier {
    pub fn new() -> anyhow::Result<Self> {
        let rules = vec![
            Rule {
                pattern: Regex::new(r"LogNet: Join request: (\S+)")?,
                extract: extract_queue,
            },
            Rule {
                pattern: Regex::new(
                    r"LogOnline: Warning: Player \|([0-9A-Za-z]+) successfully registered!",
                )?,
                extract: |caps| Some(Candidate::Registered(PlayerId::new(&caps[1]))),
            },
            Rule {
                pattern: Regex::new(
                    r"UChannel::Close: Sending CloseBunch.*UniqueId: EOS:\|([0-9A-Za-z]+)",
                )?,
                extract: |caps| Some(Candidate::Disconnected(PlayerId::new(&caps[1]))),
            },
            Rule {
                pattern: Regex::new(r"LogSFPS: Mission (\S+) switched to (\w+)")?,
                extract: |caps| {
                    Some(Candidate::Mission {
                        mission_id: caps[1].to_string(),
                        state: caps[2].to_uppercase(),
                    })
                },
            },
            Rule {
                pattern: Regex::new(r"LogSFPS: AirDrop switched to (\w+)")?,
                extract: |caps| {
                    Some(Candidate::Airdrop {
                        state: caps[1].to_uppercase(),
                    })
                },
            },
            Rule {
                pattern: Regex::new(r"LogSFPS: Helicrash switched to (\w+)")?,
                extract: |caps| {
                    Some(Candidate::Helicrash {
                        state: caps[1].to_uppercase(),
                    })
                },
            },
            Rule {
                pattern: Regex::new(r"LogSFPS: Trader (\S+) switched to (\w+)")?,
                extract: |caps| {
                    Some(Candidate::Trader {
                        trader_id: caps[1].to_string(),
                        state: caps[2].to_uppercase(),
                    })
                },
            },
            Rule {
                pattern: Regex::new(
                    r"LogSFPS: \[ASFPSGameMode::NewVehicle_(Add|Del)\] (?:Add|Del) vehicle (\S+) Total (\d+)",
                )?,
                extract: |caps| {
                    Some(Candidate::Vehicle {
                        added: &caps[1] == "Add",
                        vehicle: caps[2].to_string(),
                        total: caps[3].parse().ok()?,
                    })
                },
            },
        ];

        Ok(Self {
            rules,
            mission_level: Regex::new(r"(?i)mis_?(\d+)")?,
            digit_run: Regex::new(r"\d+")?,
        })
    }

    /// Turns one raw line into at most one event. Lines that match no rule,
    /// carry a malformed timestamp or are filtered by policy yield `None`.
    pub fn classify(&self, line: &str, context: Option<&mut ClassifierContext>) -> Option<LogEvent> {
        let line = line.trim_end_matches(['\r', '\n']);
        let timestamp = parse_line_prefix(line)?;
        let body = line.get(LINE_PREFIX_WIDTH..)?;
        let candidate = self
            .rules
            .iter()
            .find_map(|rule| rule.pattern.captures(body).map(|caps| (rule.extract)(&caps)))??;
        self.normalize(timestamp, candidate, context)
    }

    /// Classifies every line of `text` and returns the events in timestamp order.
    /// Lines sharing a timestamp keep their file order.
    pub fn classify_text(&self, text: &str, context: &mut ClassifierContext) -> Vec<LogEvent> {
        let mut events: Vec<LogEvent> = text
            .lines()
            .filter_map(|line| self.classify(line, Some(context)))
            .collect();
        events.sort_by_key(|event| event.timestamp);
        events
    }

    pub fn mission_level(&self, mission_id: &str) -> u8 {
        let digits = self
            .mission_level
            .captures(mission_id)
            .and_then(|caps| caps.get(1))
            .or_else(|| self.digit_run.find_iter(mission_id).last());
        let level = digits
            .and_then(|found| found.as_str().parse::<u32>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_MISSION_LEVEL);
        level as u8
    }

    fn normalize(
        &self,
        timestamp: i64,
        candidate: Candidate,
        mut context: Option<&mut ClassifierContext>,
    ) -> Option<LogEvent> {
        let mut fresh = |kind: &'static str, object_id: &str, state: &str| match context.as_deref_mut() {
            Some(context) => context.observe(kind, object_id, state),
            None => true,
        };

        match candidate {
            Candidate::Queue {
                player_id,
                name,
                platform,
            } => Some(LogEvent::connection(
                timestamp,
                ConnectionEvent::Queued {
                    player_id,
                    name,
                    platform,
                },
            )),
            Candidate::Registered(player_id) => Some(LogEvent::connection(
                timestamp,
                ConnectionEvent::Connected { player_id },
            )),
            Candidate::Disconnected(player_id) => Some(LogEvent::connection(
                timestamp,
                ConnectionEvent::Disconnected { player_id },
            )),
            Candidate::Mission { mission_id, state } => {
                let level = self.mission_level(&mission_id);
                if level < MIN_MISSION_LEVEL {
                    return None;
                }
                if !fresh("mission", &mission_id, &state) || state != "READY" {
                    return None;
                }
                Some(LogEvent::world(
                    timestamp,
                    WorldEvent::MissionReady { mission_id, level },
                ))
            }
            Candidate::Airdrop { state } => {
                if !fresh("airdrop", "", &state) || state != "FLYING" {
                    return None;
                }
                Some(LogEvent::world(timestamp, WorldEvent::AirdropFlying))
            }
            Candidate::Helicrash { state } => {
                if !fresh("helicrash", "", &state) || state != "READY" {
                    return None;
                }
                Some(LogEvent::world(timestamp, WorldEvent::HelicrashReady))
            }
            Candidate::Trader { trader_id, state } => {
                if !fresh("trader", &trader_id, &state) || state != "ARRIVED" {
                    return None;
                }
                Some(LogEvent::world(timestamp, WorldEvent::TraderArrived { trader_id }))
            }
            Candidate::Vehicle {
                added,
                vehicle,
                total,
            } => {
                let event = if added {
                    WorldEvent::VehicleAdded { vehicle, total }
                } else {
                    WorldEvent::VehicleRemoved { vehicle, total }
                };
                Some(LogEvent::world(timestamp, event))
            }
        }
    }
}

fn extract_queue(caps: &Captures) -> Option<Candidate> {
    let url = caps.get(1)?.as_str();
    let mut player_id = None;
    let mut name = None;
    let mut login = None;
    let mut platform = Platform::Unknown;
    for param in url.split('?').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "eosid" => player_id = Some(PlayerId::new(value)).filter(|id| !id.0.is_empty()),
            "name" => name = Some(percent_decode(value)),
            "login" => login = Some(percent_decode(value)),
            "platformid" => platform = Platform::from_platform_tag(value),
            _ => {}
        }
    }
    Some(Candidate::Queue {
        player_id: player_id?,
        name: resolve_display_name(name.as_deref(), login.as_deref()),
        platform,
    })
}

/// Prefers the decoded `Name` over `login`, skipping candidates that cannot be
/// a real display name.
pub fn resolve_display_name(name: Option<&str>, login: Option<&str>) -> String {
    [name, login]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| is_valid_display_name(candidate))
        .map(ToString::to_string)
        .unwrap_or_else(|| UNKNOWN_PLAYER_NAME.to_string())
}

pub fn is_valid_display_name(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    let len = trimmed.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        return false;
    }
    if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return false;
    }
    trimmed.chars().any(char::is_alphabetic)
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[idx + 1..idx + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(value) = decoded {
                out.push(value);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LogEventKind;

    const TS: &str = "[2024.01.15-12.30.45:123][ 42]";

    fn classifier() -> Classifier {
        Classifier::new().expect("classifier")
    }

    fn line(body: &str) -> String {
        format!("{}{}", TS, body)
    }

    fn world(event: Option<LogEvent>) -> Option<WorldEvent> {
        match event?.kind {
            LogEventKind::World(world) => Some(world),
            LogEventKind::Connection(_) => None,
        }
    }

    #[test]
    fn queue_line_extracts_identity_name_and_platform() {
        let event = classifier()
            .classify(
                &line("LogNet: Join request: /Game/Maps/world_1/World_1?eosid=|00A1b2?Name=Foo%20Bar?login=foo?platformid=PS5:123"),
                None,
            )
            .expect("event");
        assert_eq!(
            event.kind,
            LogEventKind::Connection(ConnectionEvent::Queued {
                player_id: PlayerId::new("00a1b2"),
                name: "Foo Bar".to_string(),
                platform: Platform::PlayStation,
            })
        );
    }

    #[test]
    fn queue_without_player_id_is_skipped() {
        let result = classifier().classify(
            &line("LogNet: Join request: /Game/Maps/World_1?Name=Foo"),
            None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn registered_and_disconnect_lines_share_the_player_id() {
        let classifier = classifier();
        let connected = classifier
            .classify(&line("LogOnline: Warning: Player |00A1B2 successfully registered!"), None)
            .expect("connected");
        let left = classifier
            .classify(
                &line("LogNet: UChannel::Close: Sending CloseBunch. ChIndex == 0. Name: [UChannel] ChIndex: 0, UniqueId: EOS:|00a1b2"),
                None,
            )
            .expect("left");
        assert_eq!(
            connected.kind,
            LogEventKind::Connection(ConnectionEvent::Connected {
                player_id: PlayerId::new("00a1b2")
            })
        );
        assert_eq!(
            left.kind,
            LogEventKind::Connection(ConnectionEvent::Disconnected {
                player_id: PlayerId::new("00a1b2")
            })
        );
    }

    #[test]
    fn low_level_missions_never_classify() {
        let classifier = classifier();
        for id in ["GA_Airport_mis_01_SFPSACMission", "GA_Lumber_Mis2", "GA_Town"] {
            for state in ["READY", "WAITING", "IN_PROGRESS"] {
                let text = line(&format!("LogSFPS: Mission {} switched to {}", id, state));
                assert!(classifier.classify(&text, None).is_none(), "{} {}", id, state);
            }
        }
    }

    #[test]
    fn only_ready_transition_of_high_level_mission_is_emitted() {
        let classifier = classifier();
        let ready = world(classifier.classify(
            &line("LogSFPS: Mission GA_Military_02_Mis4 switched to READY"),
            None,
        ));
        assert_eq!(
            ready,
            Some(WorldEvent::MissionReady {
                mission_id: "GA_Military_02_Mis4".to_string(),
                level: 4
            })
        );
        assert!(classifier
            .classify(&line("LogSFPS: Mission GA_Military_02_Mis4 switched to WAITING"), None)
            .is_none());
    }

    #[test]
    fn mission_level_is_capped_and_defaulted() {
        let classifier = classifier();
        assert_eq!(classifier.mission_level("GA_Bunker_Mis9"), 5);
        assert_eq!(classifier.mission_level("GA_Bunker"), 1);
        assert_eq!(classifier.mission_level("GA_Zone_03"), 3);
        assert_eq!(classifier.mission_level("GA_Zone_Mis0"), 1);
    }

    #[test]
    fn airdrop_helicrash_and_trader_only_emit_spawn_transitions() {
        let classifier = classifier();
        let cases = [
            ("LogSFPS: AirDrop switched to Flying", true),
            ("LogSFPS: AirDrop switched to Dropping", false),
            ("LogSFPS: AirDrop switched to Dead", false),
            ("LogSFPS: Helicrash switched to Ready", true),
            ("LogSFPS: Helicrash switched to Crashed", false),
            ("LogSFPS: Helicrash switched to Looted", false),
            ("LogSFPS: Trader Trader_North switched to Arrived", true),
            ("LogSFPS: Trader Trader_North switched to Departed", false),
        ];
        for (body, emitted) in cases {
            assert_eq!(
                classifier.classify(&line(body), None).is_some(),
                emitted,
                "{}",
                body
            );
        }
    }

    #[test]
    fn vehicle_events_always_carry_total() {
        let classifier = classifier();
        let added = world(classifier.classify(
            &line("LogSFPS: [ASFPSGameMode::NewVehicle_Add] Add vehicle BP_Sedan_C_1 Total 12"),
            None,
        ));
        let removed = world(classifier.classify(
            &line("LogSFPS: [ASFPSGameMode::NewVehicle_Del] Del vehicle BP_Sedan_C_1 Total 11"),
            None,
        ));
        assert_eq!(
            added,
            Some(WorldEvent::VehicleAdded {
                vehicle: "BP_Sedan_C_1".to_string(),
                total: 12
            })
        );
        assert_eq!(
            removed,
            Some(WorldEvent::VehicleRemoved {
                vehicle: "BP_Sedan_C_1".to_string(),
                total: 11
            })
        );
    }

    #[test]
    fn context_suppresses_repeated_switches() {
        let classifier = classifier();
        let mut context = ClassifierContext::new();
        let flying = line("LogSFPS: AirDrop switched to Flying");
        assert!(classifier.classify(&flying, Some(&mut context)).is_some());
        assert!(classifier.classify(&flying, Some(&mut context)).is_none());
        assert!(classifier
            .classify(&line("LogSFPS: AirDrop switched to Dead"), Some(&mut context))
            .is_none());
        assert!(classifier.classify(&flying, Some(&mut context)).is_some());
    }

    #[test]
    fn noise_and_bad_timestamps_yield_nothing() {
        let classifier = classifier();
        assert!(classifier.classify("", None).is_none());
        assert!(classifier
            .classify("[2024.01.15-99.30.45:123][ 42]LogSFPS: AirDrop switched to Flying", None)
            .is_none());
        assert!(classifier
            .classify(&line("LogTemp: something unrelated happened"), None)
            .is_none());
    }

    #[test]
    fn classify_text_orders_by_timestamp() {
        let classifier = classifier();
        let text = "[2024.01.15-12.30.50:000][ 1]LogOnline: Warning: Player |b successfully registered!\n\
[2024.01.15-12.30.40:000][ 1]LogOnline: Warning: Player |a successfully registered!\n";
        let events = classifier.classify_text(text, &mut ClassifierContext::new());
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp < events[1].timestamp);
    }

    #[test]
    fn display_name_prefers_valid_name_then_login() {
        assert_eq!(resolve_display_name(Some("Foo"), Some("foo_login")), "Foo");
        assert_eq!(resolve_display_name(Some("123456"), Some("Player1")), "Player1");
        assert_eq!(resolve_display_name(Some("x"), Some("")), UNKNOWN_PLAYER_NAME);
        assert_eq!(
            resolve_display_name(Some(&"a".repeat(40)), None),
            UNKNOWN_PLAYER_NAME
        );
        assert_eq!(resolve_display_name(Some("__--"), Some("Bob")), "Bob");
    }
}
