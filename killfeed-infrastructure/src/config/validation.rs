use anyhow::{anyhow, Result};
use encoding_rs::Encoding;

pub fn validate_url(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!("{} must be an http(s) url, got '{}'", field, value));
    }
    Ok(())
}

pub fn validate_encodings(labels: &[String]) -> Result<()> {
    if labels.is_empty() {
        return Err(anyhow!("remote_encodings must not be empty"));
    }
    for label in labels {
        if Encoding::for_label(label.as_bytes()).is_none() {
            return Err(anyhow!("unknown encoding label '{}'", label));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_need_a_scheme() {
        assert!(validate_url("x", "https://hooks.example/a").is_ok());
        assert!(validate_url("x", "hooks.example/a").is_err());
    }

    #[test]
    fn encoding_labels_are_whatwg_labels() {
        assert!(validate_encodings(&["utf-16le".to_string(), "latin1".to_string()]).is_ok());
        assert!(validate_encodings(&[]).is_err());
    }
}
