//! Record rendering shared by every sink.
//!
//! A record becomes an ordered list of styled [`Segment`]s. Sinks only map
//! [`Style`] to their own colour representation through [`Style::color`].

use sclm_types::EventType;
use sclm_types::formatting::{beautify_entity_name, format_length, format_local_timestamp};

use crate::enrichment::{citizen_url, organization_url};
use crate::events::{Event, Notice, Record};

/// 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn hex(value: u32) -> Self {
        Self((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Palette
// ─────────────────────────────────────────────────────────────────────────────

pub mod palette {
    use super::Rgb;

    pub const TIMESTAMP: Rgb = Rgb::hex(0x1E90FF);
    pub const LABEL: Rgb = Rgb::hex(0xFFFFFF);
    pub const SESSION: Rgb = Rgb::hex(0x228B22);
    pub const WARNING: Rgb = Rgb::hex(0xFF8C00);
    pub const TRANSITION: Rgb = Rgb::hex(0x9370DB);
    pub const DANGER: Rgb = Rgb::hex(0xDC143C);
    pub const FRIENDLY: Rgb = Rgb::hex(0xFF69B4);
    pub const LOCATION: Rgb = Rgb::hex(0x228B22);
    pub const EQUIPMENT: Rgb = Rgb::hex(0xA52A2A);
    pub const NUMBER: Rgb = Rgb::hex(0x1E90FF);
    pub const SPAWNPOINT: Rgb = Rgb::hex(0x9370DB);
    pub const DEFAULT: Rgb = Rgb::hex(0xEEEEEE);
    pub const BACKGROUND: Rgb = Rgb::hex(0x111111);
}

/// Which part a player played in an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Victim,
    Killer,
    Driver,
    Causer,
    Requester,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Timestamp,
    Category(EventType),
    Label,
    Player(Role),
    Zone,
    Weapon,
    Vehicle,
    Cause,
    Number,
    Spawnpoint,
    Raw,
    Notice,
}

impl Style {
    pub fn color(self) -> Rgb {
        match self {
            Style::Timestamp => palette::TIMESTAMP,
            Style::Category(event_type) => category_color(event_type),
            Style::Label => palette::LABEL,
            Style::Player(Role::Victim | Role::Driver | Role::Player) => palette::FRIENDLY,
            Style::Player(Role::Killer | Role::Causer | Role::Requester) => palette::DANGER,
            Style::Zone => palette::LOCATION,
            Style::Weapon | Style::Cause => palette::EQUIPMENT,
            Style::Vehicle => palette::FRIENDLY,
            Style::Number => palette::NUMBER,
            Style::Spawnpoint => palette::SPAWNPOINT,
            Style::Raw | Style::Notice => palette::DEFAULT,
        }
    }
}

fn category_color(event_type: EventType) -> Rgb {
    match event_type {
        EventType::ClientSpawned | EventType::ConnectStarted | EventType::ClientConnected => {
            palette::SESSION
        }
        EventType::RequestQuitLobby | EventType::VehicleDestruction | EventType::ActorStall => {
            palette::WARNING
        }
        EventType::RequestingTransition => palette::TRANSITION,
        EventType::ActorDeath | EventType::ActorStateCorpse => palette::DANGER,
        EventType::LostSpawnReservation => palette::DEFAULT,
    }
}

/// A run of text in one style, optionally a hyperlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub style: Style,
    pub link: Option<String>,
}

impl Segment {
    fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
            link: None,
        }
    }

    fn linked(text: impl Into<String>, style: Style, link: String) -> Self {
        Self {
            text: text.into(),
            style,
            link: Some(link),
        }
    }
}

/// Concatenate the text of every segment.
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

pub fn render_record(record: &Record) -> Vec<Segment> {
    match record {
        Record::Event(event) => render_event(event),
        Record::Unmatched(line) => vec![Segment::new(line.text().trim_end(), Style::Raw)],
    }
}

pub fn render_notice(notice: &Notice) -> Vec<Segment> {
    vec![Segment::new(notice.message(), Style::Notice)]
}

struct LineBuilder<'a> {
    event: &'a Event,
    segments: Vec<Segment>,
}

impl<'a> LineBuilder<'a> {
    fn new(event: &'a Event) -> Self {
        let mut segments = Vec::with_capacity(16);
        segments.push(Segment::new(
            format_local_timestamp(event.timestamp),
            Style::Timestamp,
        ));
        segments.push(Segment::new(" ", Style::Label));
        segments.push(Segment::new(
            format!("[{}]", event.event_type.label()),
            Style::Category(event.event_type),
        ));
        Self { event, segments }
    }

    fn label(&mut self, label: &str) -> &mut Self {
        self.segments.push(Segment::new(label, Style::Label));
        self
    }

    fn value(&mut self, field: &str, style: Style) -> &mut Self {
        let raw = self.event.field(field).unwrap_or_default();
        self.segments
            .push(Segment::new(beautify_entity_name(raw), style));
        self
    }

    fn length(&mut self, field: &str) -> &mut Self {
        let raw = self.event.field(field).unwrap_or_default();
        self.segments
            .push(Segment::new(format_length(raw), Style::Number));
        self
    }

    /// Player name, linked when confirmed, followed by its organization.
    fn player(&mut self, field: &str, role: Role) -> &mut Self {
        let raw = self.event.field(field).unwrap_or_default();
        let handle = beautify_entity_name(raw);
        let style = Style::Player(role);

        match self.event.affiliation(handle) {
            Some(affiliation) if affiliation.is_citizen() => {
                self.segments
                    .push(Segment::linked(handle, style, citizen_url(handle)));
                if let Some(org) = affiliation.organization() {
                    self.segments.push(Segment::new(" (", style));
                    self.segments
                        .push(Segment::linked(&org.sid, style, organization_url(&org.sid)));
                    self.segments.push(Segment::new(")", style));
                }
            }
            _ => self.segments.push(Segment::new(handle, style)),
        }
        self
    }

    fn finish(&mut self) -> Vec<Segment> {
        std::mem::take(&mut self.segments)
    }
}

pub fn render_event(event: &Event) -> Vec<Segment> {
    let mut line = LineBuilder::new(event);

    match event.event_type {
        EventType::ClientSpawned | EventType::ConnectStarted | EventType::ClientConnected => {}
        EventType::RequestQuitLobby => {
            line.label(" Requester: ").player("requester", Role::Requester);
        }
        EventType::ActorDeath => {
            line.label(" Victim: ")
                .player("victim", Role::Victim)
                .label(", Killer: ")
                .player("killer", Role::Killer)
                .label(", Zone: ")
                .value("zone", Style::Zone)
                .label(", Weapon: ")
                .value("weapon", Style::Weapon);
        }
        EventType::VehicleDestruction => {
            line.label(" Vehicle: ")
                .value("vehicle_name", Style::Vehicle)
                .label(", Driver: ")
                .player("driver", Role::Driver)
                .label(", Caused By: ")
                .player("causer", Role::Causer)
                .label(", Cause: ")
                .value("cause", Style::Cause)
                .label(", Zone: ")
                .value("zone", Style::Zone);
        }
        EventType::RequestingTransition => {
            line.label(" From: ")
                .value("from_system", Style::Zone)
                .label(" (")
                .value("from_zone", Style::Zone)
                .label("), To: ")
                .value("to_system", Style::Zone)
                .label(" (")
                .value("to_zone", Style::Zone)
                .label(")");
        }
        EventType::ActorStateCorpse => {
            line.label(" Player: ").player("player", Role::Player);
        }
        EventType::ActorStall => {
            line.label(" Player: ")
                .player("player", Role::Player)
                .label(", Length: ")
                .length("length");
        }
        EventType::LostSpawnReservation => {
            line.label(" Player: ")
                .player("player", Role::Player)
                .label(", Spawnpoint: ")
                .value("spawnpoint", Style::Spawnpoint);
        }
    }

    line.finish()
}
