//! Session status reporting

/// User-visible session state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionStatus {
    /// Connection attempt started; carries the device address if known
    Connecting { ip: Option<[u8; 4]> },
    /// WebSocket is open and the canvas was reset
    Connected { ip: Option<[u8; 4]> },
    /// Attempt failed, will retry after the reconnect interval
    ConnectFailed,
    /// Peer closed the socket, reconnecting
    Disconnected,
    /// Network link is down; the user has to exit
    LinkDown,
}

/// Receiver of status changes (UI collaborator)
///
/// Implementations must not block: calls are made from the network loop.
pub trait StatusSink {
    fn notify(&self, status: SessionStatus);

    fn on_connecting(&self, ip: Option<[u8; 4]>) {
        self.notify(SessionStatus::Connecting { ip });
    }

    fn on_connected(&self, ip: Option<[u8; 4]>) {
        self.notify(SessionStatus::Connected { ip });
    }

    fn on_connect_failed(&self) {
        self.notify(SessionStatus::ConnectFailed);
    }

    fn on_disconnected(&self) {
        self.notify(SessionStatus::Disconnected);
    }

    fn on_link_down(&self) {
        self.notify(SessionStatus::LinkDown);
    }
}

impl<T: StatusSink + ?Sized> StatusSink for &T {
    fn notify(&self, status: SessionStatus) {
        (**self).notify(status)
    }
}
