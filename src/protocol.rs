//! Wire contract of the Shadow Signal game server.
//!
//! Events are addressed by kebab-case name and carry camelCase JSON
//! payloads. [`ClientEvent`] covers everything the client emits,
//! [`ServerEvent`] everything the server pushes. Acknowledgments for
//! outbound requests arrive as an [`Ack`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ShadowSignalError};

// ── Event names ─────────────────────────────────────────────────────

pub const CREATE_ROOM: &str = "create-room";
pub const JOIN_ROOM: &str = "join-room";
pub const START_GAME: &str = "start-game";
pub const SUBMIT_VOTE: &str = "submit-vote";

pub const PLAYER_JOINED: &str = "player-joined";
pub const GAME_STARTED: &str = "game-started";
pub const SPEAKER_CHANGED: &str = "speaker-changed";
pub const TIMER_TICK: &str = "timer-tick";
pub const VOTE_SUBMITTED: &str = "vote-submitted";

/// Names of every inbound push the server sends.
pub const SERVER_EVENT_NAMES: [&str; 5] = [
    PLAYER_JOINED,
    GAME_STARTED,
    SPEAKER_CHANGED,
    TIMER_TICK,
    VOTE_SUBMITTED,
];

// ── Enums ───────────────────────────────────────────────────────────

/// Game variant chosen by the host when starting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// One infiltrator receives no word at all.
    #[default]
    Infiltrator,
    /// One spy receives a different but related word.
    Spy,
}

/// Lifecycle status of a room as reported by the server.
///
/// Unknown statuses deserialize to [`RoomStatus::Other`] so newer servers do
/// not break older clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Waiting,
    Speaking,
    Voting,
    Ended,
    #[serde(untagged)]
    Other(String),
}

// ── Structs ─────────────────────────────────────────────────────────

/// A player inside a room snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Secret role; empty until the game starts.
    #[serde(default)]
    pub role: String,
    /// Secret word; empty for roles that receive none.
    #[serde(default)]
    pub word: String,
    #[serde(default = "default_true")]
    pub is_alive: bool,
    #[serde(default)]
    pub has_spoken: bool,
}

fn default_true() -> bool {
    true
}

/// Full room snapshot pushed with most server events.
///
/// Lobby pushes (`player-joined`) only populate `code` and `players`; the
/// remaining fields fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<GameMode>,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default)]
    pub players: Vec<Player>,
    /// Index into `players` of the player currently speaking.
    #[serde(default)]
    pub current_speaker: usize,
    /// Seconds left for the current speaker.
    #[serde(default)]
    pub speaker_time_left: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

impl Room {
    /// The player currently holding the floor, if the index is in range.
    pub fn speaker(&self) -> Option<&Player> {
        self.players.get(self.current_speaker)
    }

    /// Players that have not been eliminated.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }
}

/// Acknowledgment payload returned by the server for an outbound request.
///
/// A `success: false` ack is an application-level rejection (bad room code,
/// name taken, ...), not a transport failure. It is handed to the caller
/// unmodified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Ack {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every other field of the response (e.g. `room`).
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Ack {
    /// Build an ack from the positional arguments of an ack packet.
    ///
    /// The server answers with a single object. Anything else is kept as a
    /// failed ack whose `data` holds the raw arguments under `"args"`.
    pub fn from_args(args: Vec<Value>) -> Self {
        let mut iter = args.into_iter();
        match (iter.next(), iter.next()) {
            (Some(first @ Value::Object(_)), None) => match serde_json::from_value(first) {
                Ok(ack) => ack,
                Err(e) => Self::malformed(vec![], e.to_string()),
            },
            (first, second) => {
                let raw = first.into_iter().chain(second).chain(iter).collect();
                Self::malformed(raw, "unexpected acknowledgment shape".into())
            }
        }
    }

    fn malformed(raw: Vec<Value>, reason: String) -> Self {
        let mut data = Map::new();
        data.insert("args".into(), Value::Array(raw));
        Self {
            success: false,
            error: Some(reason),
            data,
        }
    }

    /// The server's rejection message, if the request was refused.
    pub fn rejection(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            Some(self.error.as_deref().unwrap_or("request rejected"))
        }
    }

    /// Convert into `Ok(self)` or [`ShadowSignalError::Rejected`].
    pub fn into_result(self) -> Result<Self> {
        match self.rejection() {
            None => Ok(self),
            Some(message) => Err(ShadowSignalError::Rejected {
                message: message.to_string(),
            }),
        }
    }

    /// Deserialize one extra field of the response.
    ///
    /// Returns `None` if the field is absent.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T>> {
        self.data
            .get(key)
            .map(|v| serde_json::from_value(v.clone()).map_err(ShadowSignalError::from))
    }

    /// The `room` snapshot sent with `create-room` / `join-room` responses.
    pub fn room(&self) -> Option<Result<Room>> {
        self.field("room")
    }

    /// Code of the room carried in the response, without decoding the rest
    /// of the snapshot.
    pub fn room_code(&self) -> Option<&str> {
        self.data.get("room")?.get("code")?.as_str()
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Requests emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    CreateRoom,
    JoinRoom { code: String, name: String },
    StartGame { code: String, mode: GameMode },
    SubmitVote { code: String, voted_for_id: String },
}

#[derive(Serialize)]
struct JoinRoomPayload<'a> {
    code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct StartGamePayload<'a> {
    code: &'a str,
    mode: GameMode,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitVotePayload<'a> {
    code: &'a str,
    voted_for_id: &'a str,
}

impl ClientEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateRoom => CREATE_ROOM,
            ClientEvent::JoinRoom { .. } => JOIN_ROOM,
            ClientEvent::StartGame { .. } => START_GAME,
            ClientEvent::SubmitVote { .. } => SUBMIT_VOTE,
        }
    }

    /// Positional arguments sent after the event name.
    ///
    /// `create-room` carries no payload at all.
    pub fn args(&self) -> Result<Vec<Value>> {
        let payload = match self {
            ClientEvent::CreateRoom => return Ok(Vec::new()),
            ClientEvent::JoinRoom { code, name } => {
                serde_json::to_value(JoinRoomPayload { code, name })?
            }
            ClientEvent::StartGame { code, mode } => serde_json::to_value(StartGamePayload {
                code,
                mode: *mode,
            })?,
            ClientEvent::SubmitVote { code, voted_for_id } => {
                serde_json::to_value(SubmitVotePayload { code, voted_for_id })?
            }
        };
        Ok(vec![payload])
    }
}

/// Pushes sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    PlayerJoined(Room),
    GameStarted(Room),
    SpeakerChanged(Room),
    /// Seconds remaining for the current speaker.
    TimerTick(u32),
    VoteSubmitted(Room),
}

impl ServerEvent {
    /// Decode a server push by name.
    ///
    /// Returns `None` for event names outside the game contract.
    pub fn decode(name: &str, args: &[Value]) -> Option<Result<Self>> {
        let first = args.first().cloned().unwrap_or(Value::Null);
        let room = || serde_json::from_value::<Room>(first.clone()).map_err(ShadowSignalError::from);
        let event = match name {
            PLAYER_JOINED => room().map(ServerEvent::PlayerJoined),
            GAME_STARTED => room().map(ServerEvent::GameStarted),
            SPEAKER_CHANGED => room().map(ServerEvent::SpeakerChanged),
            VOTE_SUBMITTED => room().map(ServerEvent::VoteSubmitted),
            TIMER_TICK => serde_json::from_value::<u32>(first.clone())
                .map(ServerEvent::TimerTick)
                .map_err(ShadowSignalError::from),
            _ => return None,
        };
        Some(event)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::PlayerJoined(_) => PLAYER_JOINED,
            ServerEvent::GameStarted(_) => GAME_STARTED,
            ServerEvent::SpeakerChanged(_) => SPEAKER_CHANGED,
            ServerEvent::TimerTick(_) => TIMER_TICK,
            ServerEvent::VoteSubmitted(_) => VOTE_SUBMITTED,
        }
    }
}
