use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Side effects requested by the state machine.
///
/// Commands are pure data; the executor in `totem-agent` dispatches them
/// against the channel, analytics, and notification collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SendMessage {
        text: String,
    },
    SendImages {
        category: String,
    },
    TrackEvent {
        event: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },
    NotifyTeam {
        channel: String,
        message: String,
    },
    Escalate {
        reason: String,
    },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::SendImages { .. } => "send_images",
            Self::TrackEvent { .. } => "track_event",
            Self::NotifyTeam { .. } => "notify_team",
            Self::Escalate { .. } => "escalate",
        }
    }

    /// Pacing applies only between two directly adjacent message sends.
    pub fn is_send_message(&self) -> bool {
        matches!(self, Self::SendMessage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn commands_round_trip_with_snake_case_tags() {
        let command = Command::NotifyTeam {
            channel: "dev".to_owned(),
            message: "loop ceiling reached".to_owned(),
        };

        let json = serde_json::to_value(&command).expect("serialize command");
        assert_eq!(json["type"], "notify_team");

        let parsed: Command = serde_json::from_value(json).expect("deserialize command");
        assert_eq!(parsed, command);
    }

    #[test]
    fn only_message_sends_participate_in_pacing() {
        assert!(Command::SendMessage { text: "hola".to_owned() }.is_send_message());
        assert!(!Command::SendImages { category: "cocinas".to_owned() }.is_send_message());
        assert!(!Command::Escalate { reason: "handoff".to_owned() }.is_send_message());
    }
}
