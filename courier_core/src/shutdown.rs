//! Shutdown reasons reported to consumers when their channel or connection closes.

use std::fmt;
use std::sync::Arc;

/// Reply code used for a normal, application-initiated close.
pub const REPLY_SUCCESS: u16 = 200;

/// Who initiated the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownInitiator {
    /// The application closed the channel or connection.
    Application,
    /// The client library closed it, e.g. after an I/O or protocol error.
    Library,
    /// The broker closed it.
    Peer,
}

impl fmt::Display for ShutdownInitiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownInitiator::Application => "application",
            ShutdownInitiator::Library => "library",
            ShutdownInitiator::Peer => "peer",
        };
        f.write_str(name)
    }
}

/// Why a channel or connection shut down.
///
/// Passed by reference to every consumer during the shutdown sweep. The optional `cause` carries
/// the error that triggered an abnormal close.
#[derive(Debug, Clone)]
pub struct ShutdownReason {
    /// Who initiated the shutdown
    pub initiator: ShutdownInitiator,
    /// Protocol reply code
    pub reply_code: u16,
    /// Human readable reply text
    pub reply_text: String,
    /// Class id of the method that caused the close, `0` if not applicable
    pub class_id: u16,
    /// Method id of the method that caused the close, `0` if not applicable
    pub method_id: u16,
    /// The error that triggered the shutdown, if any
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ShutdownReason {
    /// Creates a new reason without a method reference or cause.
    pub fn new(
        initiator: ShutdownInitiator,
        reply_code: u16,
        reply_text: impl Into<String>,
    ) -> Self {
        ShutdownReason {
            initiator,
            reply_code,
            reply_text: reply_text.into(),
            class_id: 0,
            method_id: 0,
            cause: None,
        }
    }

    /// A normal close requested by the application.
    pub fn normal() -> Self {
        Self::new(ShutdownInitiator::Application, REPLY_SUCCESS, "Goodbye")
    }

    /// Sets the class and method ids of the protocol method that caused the close.
    pub fn with_method(mut self, class_id: u16, method_id: u16) -> Self {
        self.class_id = class_id;
        self.method_id = method_id;
        self
    }

    /// Attaches the error that triggered the close.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Whether this is a clean close initiated by the application.
    pub fn is_normal(&self) -> bool {
        self.initiator == ShutdownInitiator::Application && self.reply_code == REPLY_SUCCESS
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shutdown: {} {}",
            self.initiator, self.reply_code, self.reply_text
        )?;
        if let Some(cause) = &self.cause {
            write!(f, " (cause: {})", cause)?;
        }
        Ok(())
    }
}
