//! Subcommands.

pub mod fetch;
pub mod run;
pub mod validate;

/// Parse `KEY<sep>VALUE`, splitting at the first separator.
fn parse_pair(input: &str, sep: char) -> Result<(String, String), String> {
    match input.split_once(sep) {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY{sep}VALUE, got {input:?}")),
    }
}

/// Parse `NAME=VALUE`.
pub fn parse_env_pair(input: &str) -> Result<(String, String), String> {
    parse_pair(input, '=')
}

/// Parse `Name:Value`.
pub fn parse_header(input: &str) -> Result<(String, String), String> {
    parse_pair(input, ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("URL=https://a.test/?q=1").unwrap(),
            ("URL".to_string(), "https://a.test/?q=1".to_string())
        );
        assert_eq!(parse_env_pair("EMPTY=").unwrap().1, "");
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("NOVALUE").is_err());
    }

    #[test]
    fn test_parse_header_keeps_value_colons() {
        assert_eq!(
            parse_header("Referer:https://a.test").unwrap(),
            ("Referer".to_string(), "https://a.test".to_string())
        );
    }
}
