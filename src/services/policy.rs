//! Input rules for accounts, shared by registration, profile edits and
//! password resets. Each check returns the message shown next to the form.

use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"))
}

const PASSWORD_SYMBOLS: &str = "@$!%*?&";

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const DISPLAY_NAME_MAX_LEN: usize = 50;

pub fn required(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}

pub fn username(value: &str) -> Result<(), String> {
    required("Username", value)?;

    let len = value.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(format!(
            "Username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        ));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Username may only contain letters, digits, '_' and '-'".to_string());
    }

    Ok(())
}

pub fn email(value: &str) -> Result<(), String> {
    required("Email", value)?;

    if email_regex().is_match(value) {
        Ok(())
    } else {
        Err("Please enter a valid email address".to_string())
    }
}

/// At least 8 characters with a lowercase letter, an uppercase letter, a
/// digit and one of `@$!%*?&`, using nothing outside that alphabet.
pub fn strong_password(value: &str) -> Result<(), String> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c);

    let strong = value.chars().count() >= 8
        && value.chars().all(allowed)
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if strong {
        Ok(())
    } else {
        Err(format!(
            "Password must be at least 8 characters and include upper and lower case \
             letters, a number and one of {PASSWORD_SYMBOLS}"
        ))
    }
}

pub fn display_name(username: &str, value: &str) -> Result<(), String> {
    required("Display name", value)?;

    if value.chars().count() > DISPLAY_NAME_MAX_LEN {
        return Err(format!(
            "Display name must be at most {DISPLAY_NAME_MAX_LEN} characters"
        ));
    }

    if value == username {
        return Err("Display name must be different from your username".to_string());
    }

    Ok(())
}

pub fn profile_color(value: &str) -> Result<(), String> {
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        Err("Color must be a hex value like #3b82f6".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert!(required("Field", "x").is_ok());
        assert!(required("Field", "").is_err());
        assert!(required("Field", "   \t").is_err());
    }

    #[test]
    fn test_username() {
        assert!(username("alice").is_ok());
        assert!(username("a_b-c9").is_ok());
        assert!(username("al").is_err());
        assert!(username(&"a".repeat(33)).is_err());
        assert!(username("alice smith").is_err());
        assert!(username("alice!").is_err());
    }

    #[test]
    fn test_email() {
        assert!(email("alice@example.com").is_ok());
        assert!(email("a.b+c@sub.example.org").is_ok());
        assert!(email("alice@example").is_err());
        assert!(email("alice example@x.com").is_err());
        assert!(email("@example.com").is_err());
        assert!(email("").is_err());
    }

    #[test]
    fn test_strong_password() {
        assert!(strong_password("Str0ng!Pass").is_ok());
        assert!(strong_password("Aa1@aaaa").is_ok());
        assert!(strong_password("Aa1@aaa").is_err(), "too short");
        assert!(strong_password("str0ng!pass").is_err(), "no uppercase");
        assert!(strong_password("STR0NG!PASS").is_err(), "no lowercase");
        assert!(strong_password("Strong!Pass").is_err(), "no digit");
        assert!(strong_password("Str0ngPass1").is_err(), "no symbol");
        assert!(strong_password("Str0ng!Pass#").is_err(), "symbol outside the set");
        assert!(strong_password("Str0ng! Pass").is_err(), "whitespace");
    }

    #[test]
    fn test_display_name() {
        assert!(display_name("alice", "Alice A").is_ok());
        assert!(display_name("alice", "alice").is_err());
        assert!(display_name("alice", " ").is_err());
        assert!(display_name("alice", &"x".repeat(51)).is_err());
    }

    #[test]
    fn test_profile_color() {
        assert!(profile_color("#3b82f6").is_ok());
        assert!(profile_color("#ABCDEF").is_ok());
        assert!(profile_color("3b82f6").is_err());
        assert!(profile_color("#3b82f").is_err());
        assert!(profile_color("#3b82fg").is_err());
        assert!(profile_color("#ééé").is_err());
    }
}
