use crate::error::CoreError;
use crate::store::StorageBackend;

/// Relations the application cannot serve without.
pub const EXPECTED_RELATIONS: &[&str] = &["users"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedSchema {
    relations: Vec<String>,
}

impl ExpectedSchema {
    /// Keeps first-seen order and drops duplicates.
    pub fn new<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for relation in relations {
            let relation = relation.into();
            if !ordered.contains(&relation) {
                ordered.push(relation);
            }
        }
        Self { relations: ordered }
    }

    pub fn application() -> Self {
        Self::new(EXPECTED_RELATIONS.iter().copied())
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    relations: Vec<(String, bool)>,
}

impl SchemaStatus {
    pub fn relations(&self) -> &[(String, bool)] {
        &self.relations
    }

    pub fn is_present(&self, name: &str) -> Option<bool> {
        self.relations
            .iter()
            .find(|(relation, _)| relation == name)
            .map(|(_, present)| *present)
    }

    pub fn missing(&self) -> Vec<String> {
        self.relations
            .iter()
            .filter(|(_, present)| !present)
            .map(|(relation, _)| relation.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.relations.iter().all(|(_, present)| *present)
    }
}

/// Checks each expected relation against the catalog. Every call queries
/// storage again; nothing is cached.
pub fn verify<S>(storage: &S, expected: &ExpectedSchema) -> Result<SchemaStatus, CoreError>
where
    S: StorageBackend + ?Sized,
{
    let mut relations = Vec::with_capacity(expected.relations().len());
    for relation in expected.relations() {
        let present = storage.relation_exists(relation)?;
        tracing::debug!(relation = relation.as_str(), present, "schema relation checked");
        relations.push((relation.clone(), present));
    }
    Ok(SchemaStatus { relations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedStorage;

    #[test]
    fn expected_schema_dedups_in_order() {
        let expected = ExpectedSchema::new(["users", "roles", "users"]);
        assert_eq!(expected.relations(), ["users", "roles"]);
    }

    #[test]
    fn reports_every_expected_relation_even_when_missing() {
        let storage = ScriptedStorage::new().with_relations(&["users"]);
        let status = verify(&storage, &ExpectedSchema::new(["users", "roles"])).expect("verify");

        assert_eq!(status.is_present("users"), Some(true));
        assert_eq!(status.is_present("roles"), Some(false));
        assert_eq!(status.is_present("audit"), None);
        assert_eq!(status.missing(), vec!["roles".to_owned()]);
        assert!(!status.is_complete());
    }

    #[test]
    fn repeated_verification_is_identical_and_queries_each_time() {
        let storage = ScriptedStorage::new().with_relations(&["users"]);
        let expected = ExpectedSchema::application();

        let first = verify(&storage, &expected).expect("first verify");
        let second = verify(&storage, &expected).expect("second verify");

        assert_eq!(first, second);
        assert!(first.is_complete());
        assert_eq!(storage.relation_queries(), 2);
    }

    #[test]
    fn verification_observes_catalog_changes() {
        let storage = ScriptedStorage::new().with_relations(&["users"]);
        let expected = ExpectedSchema::application();

        assert!(verify(&storage, &expected).expect("verify").is_complete());
        storage.drop_relation("users");
        assert_eq!(
            verify(&storage, &expected).expect("verify").missing(),
            vec!["users".to_owned()]
        );
    }
}
