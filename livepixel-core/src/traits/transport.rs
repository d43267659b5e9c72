//! Message transport trait

use embassy_time::Duration;
use livepixel_protocol::Endpoint;

/// Outcome of one transport poll
///
/// Transport callbacks are returned as values so the network loop decides
/// what to do with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent<'a> {
    /// A complete text message
    Message(&'a str),
    /// Nothing arrived within the poll timeout
    Idle,
    /// The peer closed the connection or the socket failed
    Closed,
}

/// Message-oriented client connection (WebSocket over TCP on the target)
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error: core::fmt::Debug;

    /// True while the network link (WiFi) is up
    fn link_up(&self) -> bool;

    /// Local IPv4 address, if the link has one
    fn local_ip(&self) -> Option<[u8; 4]>;

    /// Open a connection, replacing any previous one
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<(), Self::Error>;

    /// Wait up to `timeout` for the next event
    async fn poll(&mut self, timeout: Duration) -> TransportEvent<'_>;

    /// Close the connection; a no-op when not connected
    async fn close(&mut self);
}

#[cfg(test)]
pub(crate) mod mock {
    use heapless::{Deque, String};

    use super::*;

    /// Scripted transport for loop and supervisor tests
    #[derive(Debug)]
    pub struct ScriptedTransport {
        pub link: bool,
        pub accept: bool,
        pub connects: usize,
        pub closes: usize,
        pub connected: bool,
        inbox: Deque<Option<String<256>>, 16>,
        current: String<256>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self {
                link: true,
                accept: true,
                connects: 0,
                closes: 0,
                connected: false,
                inbox: Deque::new(),
                current: String::new(),
            }
        }

        /// Queue a message; it is delivered by a later poll
        pub fn push_message(&mut self, text: &str) {
            let text = String::try_from(text).unwrap();
            self.inbox.push_back(Some(text)).unwrap();
        }

        /// Queue a peer close
        pub fn push_close(&mut self) {
            self.inbox.push_back(None).unwrap();
        }
    }

    impl Transport for ScriptedTransport {
        type Error = ();

        fn link_up(&self) -> bool {
            self.link
        }

        fn local_ip(&self) -> Option<[u8; 4]> {
            self.link.then_some([10, 0, 0, 7])
        }

        async fn connect(&mut self, _endpoint: &Endpoint) -> Result<(), ()> {
            self.connects += 1;
            self.connected = self.accept;
            if self.accept {
                Ok(())
            } else {
                Err(())
            }
        }

        async fn poll(&mut self, timeout: Duration) -> TransportEvent<'_> {
            match self.inbox.pop_front() {
                Some(Some(text)) => {
                    self.current = text;
                    TransportEvent::Message(&self.current)
                }
                Some(None) => {
                    self.connected = false;
                    TransportEvent::Closed
                }
                None => {
                    embassy_time::Timer::after(timeout).await;
                    TransportEvent::Idle
                }
            }
        }

        async fn close(&mut self) {
            if self.connected {
                self.closes += 1;
            }
            self.connected = false;
        }
    }
}
