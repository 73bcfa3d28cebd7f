//! Typed chat events delivered to subscribers.

use crate::state::ConnectionState;

/// An event produced from a received line or a connection state change.
///
/// Events are created once per line, published once and not retained.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ChatEvent {
    /// A chat message in the joined channel.
    Message {
        /// Display name if tagged, otherwise the prefix nick.
        sender: String,
        /// Message text.
        body: String,
    },
    /// A user joined (`joined == true`) or left the channel.
    MembershipChanged {
        /// Nick of the user.
        user: String,
        /// Whether the user joined.
        joined: bool,
    },
    /// Current channel members from a names reply, in server order.
    NamesList {
        /// Member nicks.
        users: Vec<String>,
    },
    /// The connection state machine moved to a new state.
    StatusChanged {
        /// The state entered.
        state: ConnectionState,
    },
    /// The server greeted us; the session is usable.
    ConnectionConfirmed,
    /// A line that looked like a known command could not be parsed.
    ParseFailure {
        /// The line as received.
        raw_line: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ChatEvent {
    /// The bus channel this event is published on.
    pub fn channel(&self) -> EventChannel {
        match self {
            Self::Message { .. } | Self::ParseFailure { .. } => EventChannel::Message,
            Self::MembershipChanged { .. } | Self::NamesList { .. } => EventChannel::Membership,
            Self::StatusChanged { .. } => EventChannel::Status,
            Self::ConnectionConfirmed => EventChannel::Confirmed,
        }
    }
}

/// The four independent channels of the [`EventBus`](crate::bus::EventBus).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventChannel {
    /// Chat messages and parse failures.
    Message,
    /// Joins, parts and names lists.
    Membership,
    /// Connection state changes.
    Status,
    /// Session confirmation.
    Confirmed,
}

impl EventChannel {
    /// All channels, in index order.
    pub const ALL: [EventChannel; 4] = [
        EventChannel::Message,
        EventChannel::Membership,
        EventChannel::Status,
        EventChannel::Confirmed,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Message => 0,
            Self::Membership => 1,
            Self::Status => 2,
            Self::Confirmed => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_routing() {
        let msg = ChatEvent::Message {
            sender: "a".into(),
            body: "b".into(),
        };
        assert_eq!(msg.channel(), EventChannel::Message);

        let failure = ChatEvent::ParseFailure {
            raw_line: "PRIVMSG".into(),
            reason: "missing prefix".into(),
        };
        assert_eq!(failure.channel(), EventChannel::Message);

        let names = ChatEvent::NamesList { users: vec![] };
        assert_eq!(names.channel(), EventChannel::Membership);

        let status = ChatEvent::StatusChanged {
            state: ConnectionState::Lost,
        };
        assert_eq!(status.channel(), EventChannel::Status);
        assert_eq!(ChatEvent::ConnectionConfirmed.channel(), EventChannel::Confirmed);
    }

    #[test]
    fn test_channel_indices_are_distinct() {
        for (i, ch) in EventChannel::ALL.iter().enumerate() {
            assert_eq!(ch.index(), i);
        }
    }
}
