use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID threaded through every operation that crosses a service
/// boundary (Redis, vector store, processing service).
///
/// UUID v4 for uniqueness across processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Uuid::try_parse(id).map_or_else(|_| Self(Uuid::new_v4()), Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_uuid_strings() {
        let id = CorrelationId::from("c9bf9e57-1685-4c89-bafb-ff5af830be8a");
        assert_eq!(id.to_string(), "c9bf9e57-1685-4c89-bafb-ff5af830be8a");
    }

    #[test]
    fn invalid_strings_get_a_fresh_id() {
        let a = CorrelationId::from("not-a-uuid");
        let b = CorrelationId::from("not-a-uuid");
        assert_ne!(a, b);
    }
}
