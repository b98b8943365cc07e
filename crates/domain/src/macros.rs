//! Macro for implementing Display and FromStr for status-like enums
//!
//! Operation statuses and priorities are persisted as lowercase text, so
//! every such enum needs the same pair of conversions. Parsing is
//! case-insensitive.
//!
//! # Example
//!
//! ```rust
//! use shiftsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Connectivity {
//!     Online,
//!     Offline,
//! }
//!
//! impl_domain_status_conversions!(Connectivity {
//!     Online => "online",
//!     Offline => "offline",
//! });
//!
//! assert_eq!("ONLINE".parse::<Connectivity>().unwrap(), Connectivity::Online);
//! ```

/// Implements Display and FromStr for a fieldless enum
///
/// - `Display` writes the mapped lowercase string
/// - `FromStr` accepts any casing and reports the enum name on failure
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Lane {
        Express,
        Standard,
        Deferred,
    }

    impl_domain_status_conversions!(Lane {
        Express => "express",
        Standard => "standard",
        Deferred => "deferred",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(Lane::Express.to_string(), "express");
        assert_eq!(Lane::Deferred.to_string(), "deferred");
    }

    #[test]
    fn test_fromstr_ignores_case_and_whitespace() {
        assert_eq!(Lane::from_str("STANDARD").unwrap(), Lane::Standard);
        assert_eq!(Lane::from_str(" Express ").unwrap(), Lane::Express);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = Lane::from_str("overnight");
        assert!(result.unwrap_err().contains("Invalid Lane: overnight"));
        assert!(Lane::from_str("").is_err());
    }
}
