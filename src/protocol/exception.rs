use crate::core::packet::Packet;
use crate::transport::Session;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Send `message` back to the caller of `request` as an exception response.
///
/// The body is the plain UTF-8 message, never a backtrace or serialized
/// error. This runs inside failure handling, so nothing escapes it: any
/// failure while building or sending the packet (including a panicking
/// session) is logged and reported as `false`.
pub fn send_remote_failure<X>(session: &X, request: &Packet, message: &str) -> bool
where
    X: Session + ?Sized,
{
    let response = request.reply_exception(message);

    match catch_unwind(AssertUnwindSafe(|| session.send(&response))) {
        Ok(Ok(())) => {
            debug!(id = request.id, api = %request.api, "Remote failure sent");
            true
        }
        Ok(Err(e)) => {
            warn!(id = request.id, api = %request.api, error = %e, "Failed to send remote failure");
            false
        }
        Err(_) => {
            warn!(id = request.id, api = %request.api, "Session panicked while sending remote failure");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, RpcError};
    use std::sync::Mutex;

    struct Recording(Mutex<Vec<Packet>>);

    impl Session for Recording {
        fn send(&self, packet: &Packet) -> Result<()> {
            self.0.lock().unwrap().push(packet.clone());
            Ok(())
        }
    }

    struct Broken;

    impl Session for Broken {
        fn send(&self, _packet: &Packet) -> Result<()> {
            Err(RpcError::ConnectionClosed)
        }
    }

    struct Panicking;

    impl Session for Panicking {
        fn send(&self, _packet: &Packet) -> Result<()> {
            panic!("transport bug")
        }
    }

    #[test]
    fn test_sends_exception_response() {
        let session = Recording(Mutex::new(Vec::new()));
        let request = Packet::call(12, "div", vec![1, 2, 3]);

        assert!(send_remote_failure(&session, &request, "divide by zero"));

        let sent = session.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 12);
        assert_eq!(sent[0].api, "div");
        assert!(sent[0].is_response());
        assert!(sent[0].is_exception());
        assert_eq!(sent[0].body, b"divide by zero");
    }

    #[test]
    fn test_send_error_returns_false() {
        let request = Packet::call(1, "x", vec![]);
        assert!(!send_remote_failure(&Broken, &request, "boom"));
    }

    #[test]
    fn test_panicking_session_returns_false() {
        let request = Packet::call(1, "x", vec![]);
        assert!(!send_remote_failure(&Panicking, &request, "boom"));
    }
}
