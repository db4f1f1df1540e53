//! Maps transport-level failures onto the short reason carried by a disconnect.

use std::borrow::Cow;
use std::io;

use crate::error::ProtocolError;

pub const CONNECT_TIMED_OUT: &str = "Connection timed out.";
pub const READ_TIMED_OUT: &str = "Read timed out.";
pub const WRITE_TIMED_OUT: &str = "Write timed out.";
pub const CONNECTION_CLOSED: &str = "Connection closed.";

/// Human-readable disconnect reason for `error`.
///
/// Timeouts get fixed messages; everything else is described by its own `Display`.
pub fn classify(error: &ProtocolError) -> Cow<'static, str> {
    match error {
        ProtocolError::ConnectTimeout => Cow::Borrowed(CONNECT_TIMED_OUT),
        ProtocolError::Io(e) if is_connect_timeout(e) => Cow::Borrowed(CONNECT_TIMED_OUT),
        ProtocolError::ReadTimeout => Cow::Borrowed(READ_TIMED_OUT),
        ProtocolError::WriteTimeout => Cow::Borrowed(WRITE_TIMED_OUT),
        other => Cow::Owned(other.to_string()),
    }
}

// The OS reports an unanswered SYN as a TimedOut connect error
fn is_connect_timeout(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::TimedOut
        || error
            .to_string()
            .to_ascii_lowercase()
            .contains("connection timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_have_fixed_messages() {
        assert_eq!(classify(&ProtocolError::ConnectTimeout), "Connection timed out.");
        assert_eq!(classify(&ProtocolError::ReadTimeout), "Read timed out.");
        assert_eq!(classify(&ProtocolError::WriteTimeout), "Write timed out.");
        assert_eq!(
            classify(&ProtocolError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "syn unanswered"
            ))),
            "Connection timed out."
        );
    }

    #[test]
    fn test_other_failures_use_their_description() {
        let refused = ProtocolError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(classify(&refused), "I/O error: refused");

        let trailing = ProtocolError::TrailingBytes {
            packet_type: "Chat",
            leftover: 1,
        };
        assert_eq!(
            classify(&trailing),
            "Cannot read packet Chat: 1 trailing bytes"
        );
    }
}
