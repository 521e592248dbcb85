//! Boundary validators usable by any inbound-message handler

use crate::error::ValidationError;

pub const ROOM_CODE_MIN: usize = 4;
pub const ROOM_CODE_MAX: usize = 8;
pub const NICKNAME_MIN: usize = 2;
pub const NICKNAME_MAX: usize = 20;

/// `^[A-Za-z0-9]{4,8}$`
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let len_ok = (ROOM_CODE_MIN..=ROOM_CODE_MAX).contains(&code.len());
    if len_ok && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::RoomCode)
    }
}

/// Returns the trimmed nickname when its length (in characters) is in range
pub fn validate_nickname(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    if (NICKNAME_MIN..=NICKNAME_MAX).contains(&len) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::Nickname {
            min: NICKNAME_MIN,
            max: NICKNAME_MAX,
        })
    }
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty(field.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_codes() {
        assert!(validate_room_code("ABCD").is_ok());
        assert!(validate_room_code("ab12CD34").is_ok());
        assert!(validate_room_code("abc").is_err());
        assert!(validate_room_code("ABCDEFGHI").is_err());
        assert!(validate_room_code("AB-CD").is_err());
        assert!(validate_room_code("ÄBCD").is_err());
        assert!(validate_room_code("").is_err());
    }

    #[test]
    fn test_nicknames() {
        assert_eq!(validate_nickname("  Al ").unwrap(), "Al");
        assert!(validate_nickname("A").is_err());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname(&"x".repeat(20)).is_ok());
        assert!(validate_nickname(&"x".repeat(21)).is_err());
        // counted in characters, not bytes
        assert!(validate_nickname("Jürgen").is_ok());
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("text", "hello").is_ok());
        let err = require_non_empty("text", "  ").unwrap_err();
        assert_eq!(err, ValidationError::Empty("text".to_string()));
        assert_eq!(err.to_string(), "text must not be empty");
    }
}
