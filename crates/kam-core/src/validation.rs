//! Input validation and expiry arithmetic.

use crate::error::ValidationError;

/// Maximum byte length of a package name or identity.
pub const MAX_IDENTIFIER_LEN: usize = 512;

pub const MILLIS_PER_SECOND: i64 = 1_000;

/// Structural checks shared by every identifier.
///
/// Emptiness is checked by the caller so each identifier reports its own
/// variant.
pub(crate) fn check_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters { field });
    }

    if value.trim() != value {
        return Err(ValidationError::SurroundingWhitespace { field });
    }

    Ok(())
}

/// Compute `expires_at` for a grant made at `now` (Unix ms).
///
/// A TTL of zero yields `expires_at == now`, i.e. a record that is already
/// expired at grant time. Negative TTLs and TTLs above `max_ttl_seconds`
/// are rejected.
pub fn compute_expiry(
    now: i64,
    ttl_seconds: i64,
    max_ttl_seconds: i64,
) -> Result<i64, ValidationError> {
    if ttl_seconds < 0 {
        return Err(ValidationError::NegativeTtl(ttl_seconds));
    }

    if ttl_seconds > max_ttl_seconds {
        return Err(ValidationError::TtlTooLarge {
            ttl: ttl_seconds,
            max: max_ttl_seconds,
        });
    }

    ttl_seconds
        .checked_mul(MILLIS_PER_SECOND)
        .and_then(|ttl_ms| now.checked_add(ttl_ms))
        .ok_or(ValidationError::ExpiryOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_expiry_adds_ttl_in_millis() {
        assert_eq!(compute_expiry(1_000, 3600, i64::MAX).unwrap(), 3_601_000);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        assert_eq!(compute_expiry(5_000, 0, i64::MAX).unwrap(), 5_000);
    }

    #[test]
    fn test_negative_ttl_rejected() {
        assert_eq!(
            compute_expiry(0, -1, i64::MAX),
            Err(ValidationError::NegativeTtl(-1))
        );
    }

    #[test]
    fn test_ttl_above_max_rejected() {
        assert_eq!(
            compute_expiry(0, 11, 10),
            Err(ValidationError::TtlTooLarge { ttl: 11, max: 10 })
        );
    }

    #[test]
    fn test_overflow_rejected() {
        assert_eq!(
            compute_expiry(i64::MAX - 10, 1, i64::MAX),
            Err(ValidationError::ExpiryOverflow)
        );
        assert_eq!(
            compute_expiry(0, i64::MAX, i64::MAX),
            Err(ValidationError::ExpiryOverflow)
        );
    }

    #[test]
    fn test_identifier_rules() {
        assert!(check_identifier("identity", "alice@x.com").is_ok());
        assert_eq!(
            check_identifier("identity", " alice@x.com"),
            Err(ValidationError::SurroundingWhitespace { field: "identity" })
        );
        assert_eq!(
            check_identifier("identity", "alice\n"),
            Err(ValidationError::ControlCharacters { field: "identity" })
        );
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_eq!(
            check_identifier("package_name", &long),
            Err(ValidationError::TooLong {
                field: "package_name",
                max: MAX_IDENTIFIER_LEN
            })
        );
    }

    proptest! {
        #[test]
        fn expiry_is_never_before_grant(now in 0i64..=i64::MAX / 4, ttl in 0i64..=1_000_000_000) {
            let expires_at = compute_expiry(now, ttl, i64::MAX).unwrap();
            prop_assert!(expires_at >= now);
            prop_assert_eq!(expires_at - now, ttl * MILLIS_PER_SECOND);
        }
    }
}
