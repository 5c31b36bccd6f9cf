use super::ApiError;

/// Largest page number accepted from a query string.
pub const MAX_PAGE: u64 = 1_000_000;

/// Lenient page parsing: anything missing, non-numeric or below 1 means page 1.
/// Larger numbers are capped at [`MAX_PAGE`].
#[must_use]
pub fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|page| u64::try_from(page).ok())
        .filter(|page| *page >= 1)
        .map_or(1, |page| page.min(MAX_PAGE))
}

pub fn validate_user_id(raw: &str) -> Result<i32, ApiError> {
    match raw.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::not_found("User", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-3")), 1);
        assert_eq!(parse_page(Some("2")), 2);
        assert_eq!(parse_page(Some(" 7 ")), 7);
        assert_eq!(parse_page(Some("2.5")), 1);
        assert_eq!(parse_page(Some("461168601842738792")), MAX_PAGE);
        assert_eq!(parse_page(Some("99999999999999999999")), 1);
    }

    #[test]
    fn test_validate_user_id() {
        assert_eq!(validate_user_id("12").unwrap(), 12);
        assert!(validate_user_id("0").is_err());
        assert!(validate_user_id("-1").is_err());
        assert!(validate_user_id("alice").is_err());
    }
}
