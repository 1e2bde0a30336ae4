use crate::messages::ChatLine;
use crate::network::{SessionEvent, SessionStats, SessionStatus};
use std::time::Duration;

fn format_round_trip(round_trip: Option<Duration>) -> String {
    match round_trip {
        Some(d) => format!(" (round-trip: {}ms)", d.as_millis()),
        None => String::new(),
    }
}

/// One line of terminal output for a session event
pub fn format_event(event: &SessionEvent<ChatLine>) -> String {
    match event {
        SessionEvent::Connected => "Connected".to_string(),
        SessionEvent::Message {
            message,
            round_trip,
        } => format!(
            "[{}] {}{}",
            message.sender,
            message.body,
            format_round_trip(*round_trip)
        ),
        SessionEvent::Text { text, round_trip } => {
            format!("text: {}{}", text, format_round_trip(*round_trip))
        }
        SessionEvent::DecodeFailed { error, size } => {
            format!("Dropped undecodable message ({} bytes): {}", size, error)
        }
        SessionEvent::Oversized { kind, size } => {
            format!("Dropped oversized {:?} message ({} bytes)", kind, size)
        }
        SessionEvent::PeerClosed(Some(status)) => format!("Server closed the connection: {}", status),
        SessionEvent::PeerClosed(None) => "Server closed the connection".to_string(),
        SessionEvent::ReceiveFailed { error } => format!("Connection failed: {}", error),
    }
}

pub fn format_summary(stats: &SessionStats, status: &SessionStatus) -> String {
    let mut out = String::from("Session Summary\n");
    out.push_str(&format!("  Final state: {}\n", status.state));
    out.push_str(&format!("  Frames sent: {}\n", stats.frames_sent));
    out.push_str(&format!("  Messages received: {}\n", stats.messages_received));
    out.push_str(&format!("  Text frames received: {}\n", stats.text_received));
    if stats.decode_failures > 0 {
        out.push_str(&format!("  Decode failures: {}\n", stats.decode_failures));
    }
    if stats.oversized_dropped > 0 {
        out.push_str(&format!("  Oversized dropped: {}\n", stats.oversized_dropped));
    }
    if let Some(round_trip) = stats.last_round_trip {
        out.push_str(&format!("  Last round-trip: {}ms\n", round_trip.as_millis()));
    }
    out
}
