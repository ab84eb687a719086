//! UUIDv7 helpers for time-ordered identifiers.
//!
//! Entity identifiers are UUIDv7 (RFC 9562): the leading 48 bits embed a
//! millisecond Unix timestamp, so freshly assigned ids sort by creation time
//! and index locality stays good under insert-heavy imports.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Resolve the identity of a set operation: an absent or nil id means the
/// store assigns a fresh one, anything else is kept as-is.
pub fn resolve_id(id: Option<Uuid>) -> Uuid {
    match id {
        Some(id) if !id.is_nil() => id,
        _ => new_v7(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_version_7() {
        let id = new_v7();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_is_time_ordered() {
        let a = new_v7();
        let b = new_v7();
        assert!(a <= b);
    }

    #[test]
    fn test_resolve_id() {
        assert_eq!(resolve_id(None).get_version_num(), 7);
        assert_eq!(resolve_id(Some(Uuid::nil())).get_version_num(), 7);

        let supplied = new_v7();
        assert_eq!(resolve_id(Some(supplied)), supplied);
    }
}
