//! Macro for implementing Display and FromStr for status enums
//!
//! Every persisted status column (sync status, conflict type, severity, ...)
//! round-trips through the same lowercase wire names, so the conversions are
//! generated once here instead of hand-written per enum.
//!
//! # Example
//!
//! ```rust
//! use cadence_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum WebhookState {
//!     Active,
//!     Expired,
//! }
//!
//! impl_domain_status_conversions!(WebhookState {
//!     Active => "active",
//!     Expired => "expired",
//! });
//!
//! assert_eq!(WebhookState::Expired.to_string(), "expired");
//! assert_eq!("ACTIVE".parse::<WebhookState>().unwrap(), WebhookState::Active);
//! ```

/// Implements Display and FromStr traits for status enums
///
/// - `Display` writes the mapped string verbatim.
/// - `FromStr` lowercases the input before matching, so parsing is
///   case-insensitive, and reports the enum name on failure.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase name used for storage and wire formats.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
