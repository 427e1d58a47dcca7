use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::cards::{self, UNKNOWN};
use crate::types::{Mode, Room, RoomId, Vote};

/// How a vote is printed once revealed.
pub fn format_vote(vote: &Vote, mode: Mode) -> String {
    match vote.as_deref() {
        None => "—".to_string(),
        Some(UNKNOWN) => "☕".to_string(),
        Some(token) => match mode {
            Mode::Hours => cards::hours_label(token).unwrap_or(token).to_string(),
            Mode::Normal => token.to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    pub token: String,
    pub face: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    pub voted: bool,
    pub is_creator: bool,
    /// Only present once the room is revealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// What a subscriber is shown for one delivered room value. Votes stay hidden
/// until the creator reveals them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub room_id: RoomId,
    pub name: String,
    pub creator: Option<String>,
    pub mode: Mode,
    pub revealed: bool,
    pub cards: Vec<CardView>,
    pub players: Vec<PlayerView>,
    pub all_voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<String>,
}

impl RoomView {
    pub fn new(room_id: &RoomId, room: &Room) -> Self {
        let revealed = room.is_revealed;

        let players = room
            .players
            .iter()
            .map(|(name, vote)| PlayerView {
                name: name.clone(),
                voted: vote.is_some(),
                is_creator: room.is_creator(name),
                vote: if revealed { vote.clone() } else { None },
                display: revealed.then(|| format_vote(vote, room.mode)),
            })
            .collect();

        let cards = cards::cards_for(room.mode)
            .into_iter()
            .map(|token| CardView {
                token: token.to_string(),
                face: cards::card_face(room.mode, token),
            })
            .collect();

        Self {
            room_id: room_id.clone(),
            name: room.name.clone(),
            creator: room.creator.clone(),
            mode: room.mode,
            revealed,
            cards,
            players,
            all_voted: room.all_voted(),
            average: revealed.then(|| aggregate::average(&room.players, room.mode)),
        }
    }
}
