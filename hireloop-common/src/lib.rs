//! Common types and utilities shared across Hireloop crates.
//!
//! This crate defines the platform vocabulary (experience levels, job types,
//! workplace types, date-posted buckets and sort orders), observability helpers,
//! and the shared error type used throughout the Hireloop workspace. It is
//! intentionally lightweight so that every crate can depend on it.
//!
//! # Overview
//!
//! - [`ExperienceLevel`], [`JobType`], [`WorkplaceType`]: posting attributes
//! - [`DatePosted`], [`SortBy`]: search facet dimensions
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`HireloopError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! Vocabulary values parse from the labels the platform shows in its UI:
//!
//! ```rust
//! use hireloop_common::{DatePosted, ExperienceLevel};
//!
//! let level: ExperienceLevel = "mid-senior level".parse().unwrap();
//! assert_eq!(level, ExperienceLevel::MidSenior);
//! assert_eq!(DatePosted::Past24Hours.as_str(), "Past 24 hours");
//! ```
use std::fmt;
use std::str::FromStr;

pub mod observability;

/// Error returned when a label does not name any variant of a vocabulary enum.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} label: {label:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub label: String,
}

/// Declares a closed vocabulary whose values round-trip through the labels the
/// platform renders. Parsing ignores case and surrounding whitespace.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownLabel {
                        kind: $kind,
                        label: s.to_string(),
                    })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

labelled_enum! {
    /// Seniority band attached to a posting.
    ExperienceLevel, "experience level" {
        Internship => "Internship",
        EntryLevel => "Entry level",
        Associate => "Associate",
        MidSenior => "Mid-Senior level",
        Director => "Director",
        Executive => "Executive",
    }
}

labelled_enum! {
    /// Employment type attached to a posting.
    JobType, "job type" {
        FullTime => "Full-time",
        PartTime => "Part-time",
        Contract => "Contract",
        Temporary => "Temporary",
        Volunteer => "Volunteer",
        Internship => "Internship",
        Other => "Other",
    }
}

labelled_enum! {
    /// Where the work happens.
    WorkplaceType, "workplace type" {
        OnSite => "On-site",
        Remote => "Remote",
        Hybrid => "Hybrid",
    }
}

labelled_enum! {
    /// Date-posted search bucket, declared from widest to narrowest.
    DatePosted, "date posted" {
        AnyTime => "Any time",
        PastMonth => "Past month",
        PastWeek => "Past week",
        Past24Hours => "Past 24 hours",
    }
}

labelled_enum! {
    /// Result ordering of a search.
    SortBy, "sort order" {
        MostRecent => "Most recent",
        MostRelevant => "Most relevant",
    }
}

impl DatePosted {
    /// Buckets from `self` down to the narrowest one, widest first.
    pub fn narrowing_from(self) -> Vec<DatePosted> {
        DatePosted::ALL
            .iter()
            .copied()
            .filter(|bucket| *bucket >= self)
            .collect()
    }
}

impl SortBy {
    /// The alternate ordering used when sort alternation is enabled.
    pub fn other(self) -> SortBy {
        match self {
            SortBy::MostRecent => SortBy::MostRelevant,
            SortBy::MostRelevant => SortBy::MostRecent,
        }
    }
}

/// Error types used across the Hireloop system.
#[derive(thiserror::Error, Debug)]
pub enum HireloopError {
    /// Configuration was incomplete or invalid; fatal before any attempt.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A driver (browser, network, etc.) reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// The browser session is gone and cannot be recovered in this run.
    #[error("Browser session lost: {0}")]
    SessionLost(String),

    /// Persistent storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An external helper (LLM provider, etc.) failed.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred")]
    Timeout,
}

/// Convenient alias for results that use [`HireloopError`].
pub type Result<T> = std::result::Result<T, HireloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(
            "  entry LEVEL ".parse::<ExperienceLevel>(),
            Ok(ExperienceLevel::EntryLevel)
        );
        assert_eq!("remote".parse::<WorkplaceType>(), Ok(WorkplaceType::Remote));
        assert!("sometimes".parse::<JobType>().is_err());
    }

    #[test]
    fn narrowing_starts_at_the_given_bucket() {
        assert_eq!(
            DatePosted::PastMonth.narrowing_from(),
            vec![
                DatePosted::PastMonth,
                DatePosted::PastWeek,
                DatePosted::Past24Hours
            ]
        );
        assert_eq!(
            DatePosted::Past24Hours.narrowing_from(),
            vec![DatePosted::Past24Hours]
        );
    }

    #[test]
    fn serde_uses_platform_labels() {
        let json = serde_json::to_string(&JobType::FullTime).unwrap();
        assert_eq!(json, "\"Full-time\"");
        let back: SortBy = serde_json::from_str("\"most relevant\"").unwrap();
        assert_eq!(back, SortBy::MostRelevant);
        assert_eq!(back.other(), SortBy::MostRecent);
    }
}
