use uuid::Uuid;

/// Deterministic UUIDv5 from an arbitrary string id.
///
/// Used as the store point id of a chunk: the same `chunk_id` always maps to
/// the same point, so re-upserting overwrites instead of duplicating.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

/// Point id for a chunk, rendered the way Qdrant expects UUID ids.
pub fn point_id(chunk_id: &str) -> String {
    stable_uuid(chunk_id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_chunk_id_same_point() {
        assert_eq!(point_id("abc12345-000"), point_id("abc12345-000"));
        assert_ne!(point_id("abc12345-000"), point_id("abc12345-001"));
    }

    #[test]
    fn point_id_is_uuid_shaped() {
        let id = point_id("doc-007");
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
