use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Point values a client is allowed to cast.
pub const APPROVED_POINTS: &[u32] = &[1, 2, 3, 5, 8, 13];

/// The non-numeric vote a client may cast.
pub const PASS_LABEL: &str = "Pass";

/// Sentinel stored for any value outside the approved set. Values from the
/// wire are never trusted as delivered; coercion replaces rejection so the
/// participant still shows up as having voted.
pub const CHEATER_LABEL: &str = "Cheater";

/// A recorded estimation vote. Serializes as the raw card value the clients
/// render: a number, `"Pass"`, or `"Cheater"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Points(u32),
    Pass,
    Cheater,
}

impl Vote {
    /// Coerce an arbitrary wire value into the approved set.
    /// Numbers outside the set and any unexpected shape (including numeric
    /// strings) become the sentinel.
    pub fn coerce(raw: &serde_json::Value) -> Vote {
        match raw {
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(v) if v <= u32::MAX as u64 && APPROVED_POINTS.contains(&(v as u32)) => {
                    Vote::Points(v as u32)
                },
                _ => Vote::Cheater,
            },
            serde_json::Value::String(s) if s == PASS_LABEL => Vote::Pass,
            _ => Vote::Cheater,
        }
    }
}

impl Serialize for Vote {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Vote::Points(n) => serializer.serialize_u32(*n),
            Vote::Pass => serializer.serialize_str(PASS_LABEL),
            Vote::Cheater => serializer.serialize_str(CHEATER_LABEL),
        }
    }
}

impl<'de> Deserialize<'de> for Vote {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .filter(|v| *v <= u32::MAX as u64 && APPROVED_POINTS.contains(&(*v as u32)))
                .map(|v| Vote::Points(v as u32))
                .ok_or_else(|| D::Error::custom(format!("not an approved vote: {value}"))),
            serde_json::Value::String(s) if s == PASS_LABEL => Ok(Vote::Pass),
            serde_json::Value::String(s) if s == CHEATER_LABEL => Ok(Vote::Cheater),
            _ => Err(D::Error::custom(format!("not an approved vote: {value}"))),
        }
    }
}

/// Avatar descriptor chosen at join time. The three modes are mutually
/// exclusive: a literal emoji, a generated-image seed URL, or an uploaded
/// image data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "avatarType", content = "avatar", rename_all = "lowercase")]
pub enum Avatar {
    Emoji(String),
    Dicebear(String),
    Custom(String),
}

/// One participant in an estimation room, keyed by a durable session id
/// that survives reconnects (stored client-side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub session_id: String,
    pub name: String,
    #[serde(flatten)]
    pub avatar: Avatar,
    pub vote: Option<Vote>,
    pub has_voted: bool,
}

impl Participant {
    pub fn new(session_id: String, name: String, avatar: Avatar) -> Self {
        Self {
            session_id,
            name,
            avatar,
            vote: None,
            has_voted: false,
        }
    }
}
