/// Longest accepted room key.
pub const MAX_ROOM_KEY_LEN: usize = 64;

/// Room keys are opaque strings chosen by the first joining client.
/// Reject only what would be unsafe to log or key a map on.
pub fn is_valid_room_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_ROOM_KEY_LEN && !key.chars().any(char::is_control)
}
