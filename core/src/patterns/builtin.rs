//! Patterns for the game-log lines the monitor understands.

use sclm_types::EventType;

use super::registry::{PatternRegistry, RegexMatcher};
use crate::error::PatternError;

macro_rules! stamped {
    ($body:literal) => {
        concat!(
            r"<(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z)> ",
            $body
        )
    };
}

macro_rules! notice {
    ($body:literal) => {
        concat!(
            r"<(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z)> \[Notice\] ",
            $body
        )
    };
}

/// `(event type, pattern, required fields)` in tie-break order.
const RULES: &[(EventType, &str, &[&str])] = &[
    (
        EventType::ClientSpawned,
        stamped!(r"\[CSessionManager::OnClientSpawned\] Spawned!"),
        &["timestamp"],
    ),
    (
        EventType::ConnectStarted,
        stamped!(r"\[CSessionManager::ConnectCmd\] Connect started!"),
        &["timestamp"],
    ),
    (
        EventType::ClientConnected,
        stamped!(r"\[CSessionManager::OnClientConnected\] Connected!"),
        &["timestamp"],
    ),
    (
        EventType::RequestQuitLobby,
        notice!(
            r"<\[EALobby\] EALobbyQuit> \[EALobby\]\[CEALobby::RequestQuitLobby\] (?P<requester>[\w-]+) Requesting QuitLobby"
        ),
        &["timestamp", "requester"],
    ),
    (
        EventType::ActorDeath,
        notice!(
            r"<Actor Death> CActor::Kill: '(?P<victim>[\w-]+)' \[\d+\] in zone '(?P<zone>[\w-]+)' killed by '(?P<killer>[\w-]+)' \[\d+\] using '(?P<weapon>[\w-]+)' \[Class (?P<weapon_class>[\w-]+)\] with damage type '(?P<damage_type>[\w-]+)' from direction x: (?P<direction_x>[-\d.]+), y: (?P<direction_y>[-\d.]+), z: (?P<direction_z>[-\d.]+)"
        ),
        &[
            "timestamp",
            "victim",
            "zone",
            "killer",
            "weapon",
            "weapon_class",
            "damage_type",
            "direction_x",
            "direction_y",
            "direction_z",
        ],
    ),
    (
        EventType::VehicleDestruction,
        notice!(
            r"<Vehicle Destruction> CVehicle::OnAdvanceDestroyLevel: Vehicle '(?P<vehicle_name>[\w-]+)' \[(?P<vehicle_id>\d+)\] in zone '(?P<zone>[\w-]+)' \[pos x: (?P<pos_x>[-\d.]+), y: (?P<pos_y>[-\d.]+), z: (?P<pos_z>[-\d.]+) vel x: (?P<vel_x>[-\d.]+), y: (?P<vel_y>[-\d.]+), z: (?P<vel_z>[-\d.]+)\] driven by '(?P<driver>[\w-]+)' \[(?P<driver_id>\d+)\] advanced from destroy level (?P<destroy_level_from>\d+) to (?P<destroy_level_to>\d+) caused by '(?P<causer>[\w-]+)' \[(?P<causer_id>\d+)\] with '(?P<cause>[^']+)'"
        ),
        &[
            "timestamp",
            "vehicle_name",
            "vehicle_id",
            "zone",
            "driver",
            "destroy_level_from",
            "destroy_level_to",
            "causer",
            "cause",
        ],
    ),
    (
        EventType::RequestingTransition,
        notice!(
            r"<Requesting Transition> (?P<component>[^|]+) \| (?P<status>[^|]+) \| (?P<current_system>[^|]+) \| (?P<host>[\w-]+) \[(?P<host_id>\d+)\] \| Transitioning from zone (?P<from_zone>[\w-]+) in (?P<from_system>[\w-]+) to zone (?P<to_zone>[\w-]+) in (?P<to_system>[\w-]+) \[(?P<team>[\w-]+)\]\[(?P<category>\w+)\]"
        ),
        &["timestamp", "from_zone", "from_system", "to_zone", "to_system"],
    ),
    (
        EventType::ActorStateCorpse,
        notice!(
            r"<\[ActorState\] Corpse> \[ACTOR STATE\]\[SSCActorStateCVars::LogCorpse\] Player '(?P<player>[\w-]+)' <remote client>: Running corpsify for corpse\. \[Team_ActorFeatures\]\[Actor\]"
        ),
        &["timestamp", "player"],
    ),
    (
        EventType::ActorStall,
        notice!(
            r"<Actor stall> Actor stall detected, Player: (?P<player>[\w-]+), Type: (?P<type>\w+), Length: (?P<length>[\d.]+)\. \[Team_ActorTech\]\[Actor\]"
        ),
        &["timestamp", "player", "type", "length"],
    ),
    (
        EventType::LostSpawnReservation,
        notice!(
            r"<Spawn Flow> CSCPlayerPUSpawningComponent::UnregisterFromExternalSystems: Player '(?P<player>[\w-]+)' \[(?P<player_id>\d+)\] lost reservation for spawnpoint (?P<spawnpoint>\w+) \[(?P<spawnpoint_id>\d+)\] at location (?P<location>\d+) \[Team_ActorFeatures\]\[Gamerules\]"
        ),
        &["timestamp", "player", "spawnpoint", "location"],
    ),
];

/// Build the registry with every built-in rule, in tie-break order.
pub fn default_registry() -> Result<PatternRegistry, PatternError> {
    let mut builder = PatternRegistry::builder();
    for &(event_type, pattern, required) in RULES {
        builder = builder.register(event_type, RegexMatcher::new(event_type, pattern, required)?);
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTOR_DEATH: &str = "<2024-05-01T18:22:10.123Z> [Notice] <Actor Death> CActor::Kill: 'Alice' [201990012345] in zone 'OOC_Stanton_2b_Daymar' killed by 'Bob' [201990067890] using 'KLWE_LaserRepeater_S3_1234567890123' [Class unknown] with damage type 'VehicleDestruction' from direction x: 0.000000, y: -0.5, z: 1.25 [Team_ActorTech][Actor]";

    const VEHICLE_DESTRUCTION: &str = "<2024-05-01T18:22:11.000Z> [Notice] <Vehicle Destruction> CVehicle::OnAdvanceDestroyLevel: Vehicle 'AEGS_Gladius_2030254546339' [2030254546339] in zone 'OOC_Stanton_2b_Daymar' [pos x: -1.5, y: 2.0, z: 3.25 vel x: 0.0, y: 0.0, z: 0.0] driven by 'Alice' [201990012345] advanced from destroy level 0 to 1 caused by 'Bob' [201990067890] with 'Combat' [Team_VehicleFeatures][Vehicle]";

    const TRANSITION: &str = "<2024-05-01T18:23:00.000Z> [Notice] <Requesting Transition> CSCLoadingPlatformManager | Platform manager requested | Stanton | LoadingPlatform_Lorville [1234] | Transitioning from zone Stanton1 in Stanton to zone Stanton2 in Stanton [Team_CGP4][Transit]";

    const STALL: &str = "<2024-05-01T18:24:00.000Z> [Notice] <Actor stall> Actor stall detected, Player: Carol, Type: downstream, Length: 12.3456. [Team_ActorTech][Actor]";

    const SPAWN_LOST: &str = "<2024-05-01T18:25:00.000Z> [Notice] <Spawn Flow> CSCPlayerPUSpawningComponent::UnregisterFromExternalSystems: Player 'Dave' [201990000001] lost reservation for spawnpoint Bed_Single_01 [300001] at location 7 [Team_ActorFeatures][Gamerules]";

    const CORPSE: &str = "<2024-05-01T18:26:00.000Z> [Notice] <[ActorState] Corpse> [ACTOR STATE][SSCActorStateCVars::LogCorpse] Player 'Eve' <remote client>: Running corpsify for corpse. [Team_ActorFeatures][Actor]";

    const QUIT_LOBBY: &str = "<2024-05-01T18:27:00.000Z> [Notice] <[EALobby] EALobbyQuit> [EALobby][CEALobby::RequestQuitLobby] Frank Requesting QuitLobby [Team_GameServices][Lobby]";

    #[test]
    fn test_default_registry_builds_in_catalogue_order() {
        let registry = default_registry().unwrap();
        let order: Vec<EventType> = registry.event_types().collect();
        assert_eq!(order, EventType::ALL.to_vec());
    }

    #[test]
    fn test_actor_death() {
        let registry = default_registry().unwrap();
        let (event_type, fields) = registry.classify(ACTOR_DEATH).unwrap();
        assert_eq!(event_type, EventType::ActorDeath);
        assert_eq!(fields["timestamp"], "2024-05-01T18:22:10.123Z");
        assert_eq!(fields["victim"], "Alice");
        assert_eq!(fields["killer"], "Bob");
        assert_eq!(fields["zone"], "OOC_Stanton_2b_Daymar");
        assert_eq!(fields["weapon"], "KLWE_LaserRepeater_S3_1234567890123");
        assert_eq!(fields["damage_type"], "VehicleDestruction");
        assert_eq!(fields["direction_y"], "-0.5");
    }

    #[test]
    fn test_vehicle_destruction() {
        let registry = default_registry().unwrap();
        let (event_type, fields) = registry.classify(VEHICLE_DESTRUCTION).unwrap();
        assert_eq!(event_type, EventType::VehicleDestruction);
        assert_eq!(fields["vehicle_name"], "AEGS_Gladius_2030254546339");
        assert_eq!(fields["driver"], "Alice");
        assert_eq!(fields["causer"], "Bob");
        assert_eq!(fields["cause"], "Combat");
        assert_eq!(fields["destroy_level_to"], "1");
    }

    #[test]
    fn test_other_notices() {
        let registry = default_registry().unwrap();

        let (event_type, fields) = registry.classify(TRANSITION).unwrap();
        assert_eq!(event_type, EventType::RequestingTransition);
        assert_eq!(fields["from_zone"], "Stanton1");
        assert_eq!(fields["to_zone"], "Stanton2");

        let (event_type, fields) = registry.classify(STALL).unwrap();
        assert_eq!(event_type, EventType::ActorStall);
        assert_eq!(fields["player"], "Carol");
        assert_eq!(fields["length"], "12.3456");

        let (event_type, fields) = registry.classify(SPAWN_LOST).unwrap();
        assert_eq!(event_type, EventType::LostSpawnReservation);
        assert_eq!(fields["spawnpoint"], "Bed_Single_01");

        let (event_type, fields) = registry.classify(CORPSE).unwrap();
        assert_eq!(event_type, EventType::ActorStateCorpse);
        assert_eq!(fields["player"], "Eve");

        let (event_type, fields) = registry.classify(QUIT_LOBBY).unwrap();
        assert_eq!(event_type, EventType::RequestQuitLobby);
        assert_eq!(fields["requester"], "Frank");
    }

    #[test]
    fn test_session_markers() {
        let registry = default_registry().unwrap();
        let (event_type, fields) = registry
            .classify("<2024-05-01T18:00:00.000Z> [CSessionManager::OnClientConnected] Connected!")
            .unwrap();
        assert_eq!(event_type, EventType::ClientConnected);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_unrelated_lines_do_not_match() {
        let registry = default_registry().unwrap();
        assert!(registry.classify("").is_none());
        assert!(
            registry
                .classify("<2024-05-01T18:00:00.000Z> [Notice] <ContextEstablisherTaskFinished> done")
                .is_none()
        );
        // Truncated actor death: missing the direction block
        let truncated = &ACTOR_DEATH[..ACTOR_DEATH.find(" from direction").unwrap()];
        assert!(registry.classify(truncated).is_none());
    }
}
