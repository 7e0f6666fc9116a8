use serde::{Deserialize, Serialize};

/// The three fixed board columns. Anything else fails deserialization at
/// the boundary and never reaches the board engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    #[serde(rename = "went-well")]
    WentWell,
    #[serde(rename = "improve")]
    Improve,
    #[serde(rename = "action-items")]
    ActionItems,
}

/// Snapshot of a card consumed by a similarity merge. Grouped children keep
/// only content and author; they are no longer independently addressable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedCard {
    pub content: String,
    pub author: String,
}

/// A retrospective card. Drafts (`is_submitted == false`) are excluded from
/// voting, moving, and grouping until the author submits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub column: Column,
    pub content: String,
    pub author: String,
    pub is_submitted: bool,
    pub votes: u32,
    pub voters: Vec<String>,
    #[serde(default)]
    pub grouped_cards: Vec<GroupedCard>,
}

/// The card shape accepted from `addCard`. Vote counts and submission state
/// are never taken from the wire; the server constructs the draft itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    pub id: String,
    pub column: Column,
    pub author: String,
    #[serde(default)]
    pub content: String,
}

impl Card {
    /// Build a fresh draft from a client-supplied shape.
    pub fn draft(draft: CardDraft) -> Self {
        Self {
            id: draft.id,
            column: draft.column,
            content: draft.content,
            author: draft.author,
            is_submitted: false,
            votes: 0,
            voters: Vec::new(),
            grouped_cards: Vec::new(),
        }
    }
}

/// Two cards with similarity above this are merged by `group_similar`.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Symmetric word-overlap score between two card contents: shared words
/// over the longer word count, case-insensitive, whitespace-tokenized.
pub fn similarity(a: &str, b: &str) -> f32 {
    let words_a: Vec<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let words_b: Vec<String> = b.split_whitespace().map(str::to_lowercase).collect();
    let longest = words_a.len().max(words_b.len());
    if longest == 0 {
        return 0.0;
    }
    let common = words_a
        .iter()
        .filter(|w| words_b.contains(w))
        .collect::<std::collections::HashSet<_>>()
        .len();
    common as f32 / longest as f32
}

/// Merge similar submitted cards within each column. Single greedy pass in
/// list order: each not-yet-consumed card absorbs every other not-yet-
/// consumed card in its column scoring above [`SIMILARITY_THRESHOLD`].
/// Consumed cards survive only as content+author snapshots on their anchor
/// and are removed from the list. Drafts never participate.
pub fn group_similar(cards: &mut Vec<Card>) {
    let mut consumed = vec![false; cards.len()];

    for anchor in 0..cards.len() {
        if consumed[anchor] || !cards[anchor].is_submitted {
            continue;
        }
        for other in 0..cards.len() {
            if other == anchor || consumed[other] {
                continue;
            }
            if !cards[other].is_submitted || cards[other].column != cards[anchor].column {
                continue;
            }
            if similarity(&cards[anchor].content, &cards[other].content) > SIMILARITY_THRESHOLD {
                let child = GroupedCard {
                    content: cards[other].content.clone(),
                    author: cards[other].author.clone(),
                };
                cards[anchor].grouped_cards.push(child);
                consumed[other] = true;
            }
        }
    }

    let mut keep = consumed.iter().map(|c| !c);
    cards.retain(|_| keep.next().unwrap_or(true));
}
