//! Rejection Payload
//!
//! Opaque reason value carried by rejected promises.

use std::any::Any;
use std::sync::Arc;

/// Why a promise was rejected.
///
/// Carries an opaque message. Cloning is cheap, so the same reason can be
/// delivered to any number of rejection callbacks and forwarded through
/// derived promises.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Reason {
    message: Arc<str>,
}

impl Reason {
    /// Create a reason from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
        }
    }

    /// The rejection message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Extract a reason from a caught panic payload.
    ///
    /// Panic payloads are `&str` or `String` in practice; anything else
    /// collapses to a generic message.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(text) = payload.downcast_ref::<&str>() {
            Self::new(*text)
        } else if let Some(text) = payload.downcast_ref::<String>() {
            Self::new(text.clone())
        } else {
            Self::new("callback panicked")
        }
    }
}

impl From<&str> for Reason {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Reason {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let reason = Reason::new("boom");
        assert_eq!(reason.to_string(), "boom");
        assert_eq!(reason.message(), "boom");
    }

    #[test]
    fn test_from_panic_payloads() {
        let caught = std::panic::catch_unwind(|| panic!("oops")).unwrap_err();
        assert_eq!(Reason::from_panic(caught), Reason::new("oops"));

        let caught = std::panic::catch_unwind(|| panic!("{}", 7)).unwrap_err();
        assert_eq!(Reason::from_panic(caught), Reason::new("7"));

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(Reason::from_panic(caught), Reason::new("callback panicked"));
    }
}
