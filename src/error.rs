//! Error types for the UBX driver.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context for debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **I/O Errors**: transport read/write failures
//! - **Frame Errors**: malformed sync, length, or checksum data
//! - **Decode Errors**: well-formed frame with an uninterpretable payload
//! - **Command Timeouts**: no correlated response before the deadline
//! - **Version Errors**: unparseable or unresolvable protocol version
//! - **Closed**: the driver task has shut down
//!
//! Transient wire noise never surfaces here; the receiver loop recovers from
//! framing and decode failures internally. Callers only see command,
//! negotiation, and shutdown errors.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use ubxlink::UbxError;
//! use std::time::Duration;
//!
//! let error = UbxError::command_timeout(0x06, 0x01, Duration::from_secs(1));
//! if error.is_retryable() {
//!     println!("Can retry this operation");
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T, E = UbxError> = std::result::Result<T, E>;

/// Main error type for UBX driver operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UbxError {
    #[error("Transport I/O failure during {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed frame: {details}")]
    Frame { details: String },

    #[error("Decode error in {kind}: {details}")]
    Decode { kind: String, details: String },

    #[error("Command {class:#04x}/{id:#04x} timed out after {duration:?}")]
    CommandTimeout { class: u8, id: u8, duration: Duration },

    #[error("Unrecognized protocol version extension: {extension:?}")]
    VersionParse { extension: String },

    #[error("Version negotiation failed: {reason}")]
    Negotiation {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Driver is closed")]
    Closed,
}

impl UbxError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            UbxError::Io { .. } => true,
            UbxError::CommandTimeout { .. } => true,
            UbxError::Negotiation { .. } => true,
            UbxError::Frame { .. } => false,
            UbxError::Decode { .. } => false,
            UbxError::VersionParse { .. } => false,
            UbxError::Closed => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            UbxError::Io { .. } => vec![
                "Check wiring and port configuration",
                "Verify the receiver is powered",
                "Confirm the baud rate matches the device",
            ],
            UbxError::Frame { .. } => vec![
                "Check for electrical noise on the serial line",
                "Verify the configured baud rate",
            ],
            UbxError::Decode { .. } => vec![
                "Check the device firmware generation",
                "Verify the payload layout against the interface description",
            ],
            UbxError::CommandTimeout { .. } => vec![
                "Increase the command timeout",
                "Verify the receiver loop was started before sending",
                "Check that the device accepts this message class",
            ],
            UbxError::VersionParse { .. } => vec![
                "Inspect the raw MON-VER extension fields",
                "Report the unrecognized format upstream",
            ],
            UbxError::Negotiation { .. } => vec![
                "Retry after a device power cycle",
                "Increase the negotiation retry count",
            ],
            UbxError::Closed => vec![
                "Attach a new driver instance",
            ],
        }
    }

    /// Helper constructor for transport I/O errors with operation context.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        UbxError::Io { context: context.into(), source }
    }

    /// Helper constructor for framing errors.
    pub fn frame_error(details: impl Into<String>) -> Self {
        UbxError::Frame { details: details.into() }
    }

    /// Helper constructor for payload decode errors.
    pub fn decode_error(kind: impl Into<String>, details: impl Into<String>) -> Self {
        UbxError::Decode { kind: kind.into(), details: details.into() }
    }

    /// Helper constructor for command timeouts.
    pub fn command_timeout(class: u8, id: u8, duration: Duration) -> Self {
        UbxError::CommandTimeout { class, id, duration }
    }

    /// Helper constructor for negotiation failures.
    pub fn negotiation_failed(reason: impl Into<String>) -> Self {
        UbxError::Negotiation { reason: reason.into(), source: None }
    }

    /// Helper constructor for negotiation failures with a source.
    pub fn negotiation_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        UbxError::Negotiation { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for UbxError {
    fn from(err: std::io::Error) -> Self {
        UbxError::Io { context: "<transport>".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_format_correctly_with_arbitrary_context(
            context in "\\w+",
            details in ".*",
            extension in ".*",
            class in any::<u8>(),
            id in any::<u8>(),
            duration_ms in 1u64..60000u64
          ) {
            // Property: Error messages contain their context fields
            let io_error = UbxError::io_error(
                context.clone(),
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"),
            );
            let decode_error = UbxError::decode_error("NAV-PVT", details.clone());
            let version_error = UbxError::VersionParse { extension: extension.clone() };
            let timeout_error =
                UbxError::command_timeout(class, id, Duration::from_millis(duration_ms));

            prop_assert!(io_error.to_string().contains(&context));
            prop_assert!(decode_error.to_string().contains(&details));
            let extension_debug = format!("{:?}", extension);
            let class_hex = format!("{:#04x}", class);
            let id_hex = format!("{:#04x}", id);
            prop_assert!(version_error.to_string().contains(&extension_debug));
            prop_assert!(timeout_error.to_string().contains(&class_hex));
            prop_assert!(timeout_error.to_string().contains(&id_hex));

            // Property: No error message is empty
            prop_assert!(!io_error.to_string().is_empty());
            prop_assert!(!decode_error.to_string().is_empty());
            prop_assert!(!version_error.to_string().is_empty());
            prop_assert!(!timeout_error.to_string().is_empty());
          }

          #[test]
          fn retryable_errors_always_offer_suggestions(
            reason in ".*",
            duration_ms in 1u64..60000u64
          ) {
            // Property: Every variant classifies and carries at least one suggestion
            let errors = vec![
                UbxError::io_error("read", std::io::Error::other(reason.clone())),
                UbxError::frame_error(reason.clone()),
                UbxError::decode_error("ACK-ACK", reason.clone()),
                UbxError::command_timeout(0x06, 0x01, Duration::from_millis(duration_ms)),
                UbxError::VersionParse { extension: reason.clone() },
                UbxError::negotiation_failed(reason.clone()),
                UbxError::Closed,
            ];

            for error in &errors {
                prop_assert!(!error.recovery_suggestions().is_empty());
            }

            // Property: Transient classes retry, structural classes do not
            prop_assert!(errors[0].is_retryable());
            prop_assert!(errors[3].is_retryable());
            prop_assert!(errors[5].is_retryable());
            prop_assert!(!errors[1].is_retryable());
            prop_assert!(!errors[2].is_retryable());
            prop_assert!(!errors[4].is_retryable());
            prop_assert!(!errors[6].is_retryable());
          }

          #[test]
          fn error_source_chaining_preserves_information(
            base_message in "[a-z ]+",
            reason in "[a-z ]+"
          ) {
            // Property: Negotiation errors preserve their source chain
            let base: Box<dyn std::error::Error + Send + Sync> =
                Box::new(std::io::Error::other(base_message.clone()));
            let top = UbxError::negotiation_failed_with_source(reason.clone(), base);

            let mut found_base_message = false;
            let mut current = std::error::Error::source(&top);
            while let Some(source) = current {
                if source.to_string().contains(&base_message) {
                    found_base_message = true;
                }
                current = std::error::Error::source(source);
            }

            prop_assert!(found_base_message);
            prop_assert!(top.to_string().contains(&reason));
          }
        }
    }

    #[test]
    fn error_constructors_validation() {
        let io_error = UbxError::io_error(
            "flush",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "test"),
        );
        assert!(matches!(io_error, UbxError::Io { .. }));

        let frame_error = UbxError::frame_error("bad checksum");
        assert!(matches!(frame_error, UbxError::Frame { .. }));

        let timeout = UbxError::command_timeout(0x0A, 0x04, Duration::from_secs(1));
        assert!(matches!(timeout, UbxError::CommandTimeout { class: 0x0A, id: 0x04, .. }));
    }

    #[test]
    fn error_traits_validation() {
        // Compile-time check: UbxError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<UbxError>();

        let error = UbxError::Closed;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn from_io_conversion_works() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no port");
        let ubx_err: UbxError = io_err.into();

        match ubx_err {
            UbxError::Io { source, .. } => {
                assert_eq!(source.to_string(), "no port");
            }
            _ => panic!("Expected Io error variant"),
        }
    }
}
