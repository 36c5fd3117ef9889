use std::env;

use killfeed_domain::SourceError;

/// `env:NAME` reads the variable, anything else is the secret itself.
pub fn resolve_credential(reference: &str) -> Result<String, SourceError> {
    let trimmed = reference.trim();
    if let Some(name) = trimmed.strip_prefix("env:") {
        let name = name.trim();
        if name.is_empty() {
            return Err(SourceError::Configuration(
                "credential reference 'env:' names no variable".to_string(),
            ));
        }
        return env::var(name).map_err(|_| {
            SourceError::Configuration(format!("credential variable {} is not set", name))
        });
    }
    if trimmed.is_empty() {
        return Err(SourceError::Configuration("empty credential".to_string()));
    }
    Ok(reference.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_values_pass_through() {
        assert_eq!(resolve_credential("hunter2").expect("literal"), "hunter2");
    }

    #[test]
    fn env_references_read_the_environment() {
        env::set_var("KILLFEED_TEST_SFTP_SECRET", "s3cret");
        assert_eq!(
            resolve_credential("env:KILLFEED_TEST_SFTP_SECRET").expect("env"),
            "s3cret"
        );
    }

    #[test]
    fn missing_variable_is_terminal() {
        let err = resolve_credential("env:KILLFEED_TEST_DOES_NOT_EXIST").expect_err("missing");
        assert!(err.is_terminal());
        assert!(resolve_credential("env:").expect_err("blank").is_terminal());
    }
}
