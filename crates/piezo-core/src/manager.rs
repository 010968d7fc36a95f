//! GUI-facing connection manager.
//!
//! Owns one accessor and mediates its connection lifecycle. Connection
//! failures are surfaced as stored state rather than propagated, so a UI
//! can render a status message without unwinding; notifications go through
//! an optional state-change callback.

use crate::accessor::DatabaseAccessor;
use crate::error::AccessorError;
use tracing::{info, warn};

type StateChangeCallback = Box<dyn Fn(bool) + Send>;

/// Manages the connection state of one database accessor.
pub struct ConnectionManager {
    accessor: Box<dyn DatabaseAccessor>,
    last_error: Option<AccessorError>,
    on_state_change: Option<StateChangeCallback>,
}

impl ConnectionManager {
    pub fn new(accessor: Box<dyn DatabaseAccessor>) -> Self {
        Self {
            accessor,
            last_error: None,
            on_state_change: None,
        }
    }

    /// Register a callback invoked with the new connection state after
    /// every connect/disconnect attempt.
    pub fn on_state_change(&mut self, callback: impl Fn(bool) + Send + 'static) {
        self.on_state_change = Some(Box::new(callback));
    }

    /// Attempt to connect; returns whether the connection is now active.
    /// The failure, if any, is retained for [`Self::last_error`].
    pub fn connect_to_db(&mut self) -> bool {
        match self.accessor.connect() {
            Ok(()) => {
                info!("connected to database");
                self.last_error = None;
            }
            Err(error) => {
                warn!(%error, "database connection failed");
                self.last_error = Some(error);
            }
        }
        let connected = self.accessor.is_connected();
        self.notify(connected);
        connected
    }

    /// Close the connection if one is active.
    pub fn disconnect_from_db(&mut self) {
        if self.accessor.is_connected() {
            if let Err(error) = self.accessor.close_connection() {
                warn!(%error, "error while closing the database connection");
                self.last_error = Some(error);
            }
        }
        self.notify(false);
    }

    pub fn is_connected(&self) -> bool {
        self.accessor.is_connected()
    }

    /// The error from the most recent failed connect/disconnect, if any.
    pub fn last_error(&self) -> Option<&AccessorError> {
        self.last_error.as_ref()
    }

    /// Access the managed accessor for data operations.
    pub fn accessor(&self) -> &dyn DatabaseAccessor {
        self.accessor.as_ref()
    }

    fn notify(&self, connected: bool) {
        if let Some(callback) = &self.on_state_change {
            callback(connected);
        }
    }
}
