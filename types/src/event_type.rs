use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of game events the monitor knows how to extract.
///
/// The declaration order is the registration order of the default pattern
/// rules, which is also the first-match tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    ClientSpawned,
    ConnectStarted,
    ClientConnected,
    RequestQuitLobby,
    ActorDeath,
    VehicleDestruction,
    RequestingTransition,
    ActorStateCorpse,
    ActorStall,
    LostSpawnReservation,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::ClientSpawned,
        EventType::ConnectStarted,
        EventType::ClientConnected,
        EventType::RequestQuitLobby,
        EventType::ActorDeath,
        EventType::VehicleDestruction,
        EventType::RequestingTransition,
        EventType::ActorStateCorpse,
        EventType::ActorStall,
        EventType::LostSpawnReservation,
    ];

    /// Kebab-case name used on the command line and in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ClientSpawned => "client-spawned",
            EventType::ConnectStarted => "connect-started",
            EventType::ClientConnected => "client-connected",
            EventType::RequestQuitLobby => "request-quit-lobby",
            EventType::ActorDeath => "actor-death",
            EventType::VehicleDestruction => "vehicle-destruction",
            EventType::RequestingTransition => "requesting-transition",
            EventType::ActorStateCorpse => "actor-state-corpse",
            EventType::ActorStall => "actor-stall",
            EventType::LostSpawnReservation => "lost-spawn-reservation",
        }
    }

    /// Human readable category shown between brackets in rendered lines.
    pub fn label(&self) -> &'static str {
        match self {
            EventType::ClientSpawned => "Client Spawned",
            EventType::ConnectStarted => "Connect Started",
            EventType::ClientConnected => "Client Connected",
            EventType::RequestQuitLobby => "Request Quit Lobby",
            EventType::ActorDeath => "Actor Death",
            EventType::VehicleDestruction => "Vehicle Destruction",
            EventType::RequestingTransition => "Requesting Transition",
            EventType::ActorStateCorpse => "Corpse",
            EventType::ActorStall => "Actor Stall",
            EventType::LostSpawnReservation => "Spawn Lost",
        }
    }

    /// Names of the extracted fields that hold player handles.
    ///
    /// Only these fields are sent to the organization lookup.
    pub fn handle_fields(&self) -> &'static [&'static str] {
        match self {
            EventType::ActorDeath => &["victim", "killer"],
            EventType::VehicleDestruction => &["driver", "causer"],
            EventType::RequestQuitLobby => &["requester"],
            EventType::ActorStateCorpse | EventType::ActorStall | EventType::LostSpawnReservation => {
                &["player"]
            }
            EventType::ClientSpawned
            | EventType::ConnectStarted
            | EventType::ClientConnected
            | EventType::RequestingTransition => &[],
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(EventType::as_str)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not in the event catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = EventType::names().collect();
        write!(
            f,
            "unknown event type '{}' (valid: {})",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for UnknownEventType {}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownEventType(needle.to_string()))
    }
}
