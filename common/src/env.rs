use std::env;
use std::str::FromStr;

/// Reads an environment variable and parses it, falling back to `default`
/// when the variable is unset or does not parse.
pub fn get_parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Reads a string environment variable, falling back to `default` when
/// the variable is unset.
pub fn get_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parsed() {
        env::set_var("COMMON_ENV_TEST_PARSED", "42");
        assert_eq!(get_parsed("COMMON_ENV_TEST_PARSED", 7i64), 42);

        env::set_var("COMMON_ENV_TEST_MALFORMED", "forty-two");
        assert_eq!(get_parsed("COMMON_ENV_TEST_MALFORMED", 7i64), 7);

        assert_eq!(get_parsed("COMMON_ENV_TEST_UNSET", 7i64), 7);
    }

    #[test]
    fn test_get_string() {
        env::set_var("COMMON_ENV_TEST_STRING", "value");
        assert_eq!(get_string("COMMON_ENV_TEST_STRING", "fallback"), "value");
        assert_eq!(get_string("COMMON_ENV_TEST_STRING_UNSET", "fallback"), "fallback");
    }
}
