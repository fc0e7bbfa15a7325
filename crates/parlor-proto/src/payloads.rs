//! JSON-encoded message payloads.
//!
//! The packet header is raw binary for routing, but every structured payload
//! is a UTF-8 JSON document. JSON keeps the wire debuggable from any client
//! and needs no schema distribution; the server never deserializes payloads
//! it only routes (game broadcasts go out exactly as marshalled).

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Encode any payload struct to its wire bytes.
///
/// # Errors
///
/// `ProtocolError::InvalidJson` when serialization fails.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a payload struct from wire bytes.
///
/// # Errors
///
/// `ProtocolError::InvalidJson` when the bytes are not the expected JSON
/// document.
pub fn from_bytes<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Room identifier payload: the JoinRoom request and the CreateRoom ack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomId {
    /// Target room id.
    pub room_id: String,
}

/// Envelope for a PlayerAction packet. Only the discriminator is decoded
/// here; states that need more re-parse the raw payload themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    /// Action discriminator, e.g. `"spin"`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Result of a single spin of the sample slot machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinResult {
    /// Whether the spin paid out.
    pub win: bool,
    /// Payout amount; 0 on a loss.
    pub payout: u32,
    /// The three reels as rolled.
    pub symbols: [u8; 3],
}

impl SpinResult {
    /// Score three reels.
    ///
    /// Three equal reels win. Three sevens pay 1000, any other triple pays
    /// 100, everything else pays nothing.
    #[must_use]
    pub fn score(symbols: [u8; 3]) -> Self {
        let win = symbols[0] == symbols[1] && symbols[1] == symbols[2];
        let payout = match (win, symbols[0]) {
            (true, 7) => 1000,
            (true, _) => 100,
            (false, _) => 0,
        };
        Self { win, payout, symbols }
    }
}

/// Marshalled game data for the sample slot machine, broadcast in
/// GameStart and GameSync packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMachineData {
    /// Current reel positions.
    pub reels: [u8; 3],
    /// Spins taken this round.
    pub spin_count: u32,
    /// Most recent spin result, `None` before the first spin.
    pub last_result: Option<SpinResult>,
}

impl SlotMachineData {
    /// Fresh round: zeroed reels, no spins yet.
    #[must_use]
    pub fn new_round() -> Self {
        Self { reels: [0; 3], spin_count: 0, last_result: None }
    }
}

/// Marshalled results for the sample slot machine, broadcast in the
/// GameEnd packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotResults {
    /// Total spins taken during the round.
    pub final_spin_count: u32,
    /// Whether the last spin won, `None` when nobody spun.
    pub last_win: Option<bool>,
}
