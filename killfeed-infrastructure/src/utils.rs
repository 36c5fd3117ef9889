use time::OffsetDateTime;

pub fn millis_to_utc(ms: i64) -> OffsetDateTime {
    let nanos = i128::from(ms).saturating_mul(1_000_000);
    OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn utc_to_millis(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}

/// ClickHouse `Nullable(DateTime64(3))` has no serde helper for `Option`, so
/// optional instants are stored as epoch milliseconds with 0 meaning unset.
pub fn optional_millis(value: Option<i64>) -> i64 {
    value.unwrap_or(0)
}

pub fn millis_or_none(value: i64) -> Option<i64> {
    (value > 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_survive_conversion() {
        let ms = 1_705_320_000_123;
        assert_eq!(utc_to_millis(millis_to_utc(ms)), ms);
        assert_eq!(millis_or_none(optional_millis(None)), None);
        assert_eq!(millis_or_none(optional_millis(Some(5))), Some(5));
    }
}
