//! Core track types shared across populators

/// Stable identity for a track within the owning collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub i64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only handle to a track owned by an external collection.
///
/// The engine never interprets track content; it only reads the identity,
/// the content fingerprint and the library-membership flag. Handles are
/// cheap to clone and get aggregated into group/header nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    id: TrackId,
    hash: String,
    in_library: bool,
}

impl Track {
    /// Create a track handle from its identity and content fingerprint.
    pub fn new(id: TrackId, hash: impl Into<String>, in_library: bool) -> Self {
        Self {
            id,
            hash: hash.into(),
            in_library,
        }
    }

    /// Stable identity of the track.
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Content fingerprint, stable for unchanged track data.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether the track is currently part of the library.
    pub fn is_in_library(&self) -> bool {
        self.in_library
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_accessors() {
        let track = Track::new(TrackId(7), "abc123", true);
        assert_eq!(track.id(), TrackId(7));
        assert_eq!(track.hash(), "abc123");
        assert!(track.is_in_library());

        let outside = Track::new(TrackId(8), "def456", false);
        assert!(!outside.is_in_library());
    }

    #[test]
    fn test_track_id_display() {
        assert_eq!(TrackId(42).to_string(), "42");
    }
}
