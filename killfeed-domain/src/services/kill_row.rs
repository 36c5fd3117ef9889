use crate::entities::{KillRecord, UNKNOWN_PLAYER_NAME};
use crate::value_objects::{parse_row_timestamp, GuildId, PlayerId, Platform, ServerId};

const FIELD_SEPARATOR: char = ';';
const MIN_FIELDS: usize = 7;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedKillCsv {
    pub records: Vec<KillRecord>,
    /// Non-blank rows that could not be parsed.
    pub skipped: u64,
}

/// Parses one `;`-separated kill row. Rows that are short, carry a bad
/// timestamp or a non-numeric distance yield `None`.
pub fn parse_kill_row(guild_id: GuildId, server_id: &ServerId, row: &str) -> Option<KillRecord> {
    let fields: Vec<&str> = row
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .split(FIELD_SEPARATOR)
        .map(str::trim)
        .collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let timestamp = parse_row_timestamp(fields[0])?;
    let killer_id = PlayerId::new(fields[2]);
    let victim_id = PlayerId::new(fields[4]);
    if killer_id.0.is_empty() || victim_id.0.is_empty() {
        return None;
    }
    let weapon = fields[5].to_string();
    let distance = fields[6].parse::<f64>().ok().filter(|value| value.is_finite())?;
    let is_suicide = killer_id == victim_id || weapon.to_lowercase().starts_with("suicide");

    Some(KillRecord {
        guild_id,
        server_id: server_id.clone(),
        timestamp,
        killer_name: player_name(fields[1]),
        killer_id,
        killer_platform: fields.get(7).map(|tag| Platform::from_platform_tag(tag)).unwrap_or_default(),
        victim_name: player_name(fields[3]),
        victim_id,
        victim_platform: fields.get(8).map(|tag| Platform::from_platform_tag(tag)).unwrap_or_default(),
        weapon,
        distance: distance.max(0.0),
        is_suicide,
    })
}

/// Parses a whole kill-log file, keeping file order.
pub fn parse_kill_csv(guild_id: GuildId, server_id: &ServerId, text: &str) -> ParsedKillCsv {
    let mut parsed = ParsedKillCsv::default();
    for row in text.lines() {
        if row.trim().is_empty() {
            continue;
        }
        match parse_kill_row(guild_id, server_id, row) {
            Some(record) => parsed.records.push(record),
            None => parsed.skipped += 1,
        }
    }
    parsed
}

fn player_name(raw: &str) -> String {
    if raw.is_empty() {
        UNKNOWN_PLAYER_NAME.to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerId {
        ServerId::new("7020")
    }

    #[test]
    fn parses_full_row() {
        let record = parse_kill_row(
            GuildId(1),
            &server(),
            "2024.01.15-12.30.45;Foo;AAA;Bar;BBB;AK-47;123.5;PS5;XSX",
        )
        .expect("row");
        assert_eq!(record.killer_id, PlayerId::new("aaa"));
        assert_eq!(record.victim_name, "Bar");
        assert_eq!(record.distance, 123.5);
        assert_eq!(record.killer_platform, Platform::PlayStation);
        assert_eq!(record.victim_platform, Platform::Xbox);
        assert!(!record.is_suicide);
    }

    #[test]
    fn suicide_detected_by_identity_or_weapon() {
        let same = parse_kill_row(GuildId(1), &server(), "2024.01.15-12.30.45;Foo;AAA;Foo;AAA;Fall;0").expect("row");
        let weapon = parse_kill_row(GuildId(1), &server(), "2024.01.15-12.30.45;Foo;AAA;Foo;BBB;suicide_by_relocation;0").expect("row");
        assert!(same.is_suicide);
        assert!(weapon.is_suicide);
    }

    #[test]
    fn malformed_rows_are_counted_not_fatal() {
        let text = "\u{feff}2024.01.15-12.30.45;Foo;AAA;Bar;BBB;AK;10\n\
garbage\n\
2024.13.45-12.30.45;Foo;AAA;Bar;BBB;AK;10\n\
2024.01.15-12.30.46;Foo;AAA;Bar;BBB;AK;far\n\
\n\
2024.01.15-12.30.47;Foo;AAA;Bar;BBB;AK;11\r\n";
        let parsed = parse_kill_csv(GuildId(1), &server(), text);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped, 3);
    }
}
