pub mod estimation;
pub mod protocol;
pub mod retro;
pub mod room;

/// Identifier for a player inside a breakout room, allocated sequentially
/// by the simulation as players join.
pub type PlayerId = u64;
