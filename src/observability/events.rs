//! Observable mapper events
//!
//! Events are explicit and typed. Each maps to one stable log name.

use std::fmt;

use super::Severity;

/// Observable events in aeromap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Schema lifecycle
    /// Registry frozen into a schema
    SchemaFrozen,
    /// Schema published process-wide
    SchemaInstalled,

    // Configuration
    /// Mapper configuration loaded from disk
    ConfigLoaded,

    // Mapper operations
    /// Entities handed to the driver for insertion
    EntityInserted,
    /// Entities loaded through the driver
    EntityFound,
    /// Entities updated through the driver
    EntityUpdated,
    /// Entities deleted through the driver
    EntityDeleted,
    /// Operation rejected by a schema contract
    EntityRejected,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SchemaFrozen => "SCHEMA_FROZEN",
            Event::SchemaInstalled => "SCHEMA_INSTALLED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::EntityInserted => "ENTITY_INSERTED",
            Event::EntityFound => "ENTITY_FOUND",
            Event::EntityUpdated => "ENTITY_UPDATED",
            Event::EntityDeleted => "ENTITY_DELETED",
            Event::EntityRejected => "ENTITY_REJECTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::EntityRejected => Severity::Warn,
            Event::EntityFound => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::SchemaFrozen,
            Event::SchemaInstalled,
            Event::ConfigLoaded,
            Event::EntityInserted,
            Event::EntityFound,
            Event::EntityUpdated,
            Event::EntityDeleted,
            Event::EntityRejected,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_rejections_warn() {
        assert_eq!(Event::EntityRejected.severity(), Severity::Warn);
        assert_eq!(Event::EntityInserted.severity(), Severity::Info);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::SchemaFrozen), "SCHEMA_FROZEN");
    }
}
