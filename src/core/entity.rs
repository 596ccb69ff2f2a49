//! Entity payloads before and after validation

use crate::core::field::{Field, FieldName};
use crate::core::schema::ID_FIELD;
use std::collections::BTreeMap;
use uuid::Uuid;

/// An untyped entity payload as decoded from the wire
pub type RawEntity = serde_json::Map<String, serde_json::Value>;

/// A validated entity with one typed value per present field
///
/// Optional fields left unset are simply absent.
pub type Entity = BTreeMap<FieldName, Field>;

/// A validated patch; `None` clears an optional field
pub type PartialEntity = BTreeMap<FieldName, Option<Field>>;

/// Read the id of a stored entity
pub fn entity_id(entity: &Entity) -> Option<Uuid> {
    entity.get(ID_FIELD).and_then(Field::as_uuid)
}

/// Render an entity in its canonical JSON form
pub fn entity_to_json(entity: &Entity) -> serde_json::Value {
    serde_json::Value::Object(
        entity
            .iter()
            .map(|(name, field)| (name.clone(), field.to_json()))
            .collect(),
    )
}

/// Apply a validated patch to a stored entity
pub fn apply_patch(entity: &mut Entity, patch: &PartialEntity) {
    for (name, value) in patch {
        match value {
            Some(field) => {
                entity.insert(name.clone(), field.clone());
            }
            None => {
                entity.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_patch_sets_and_clears() {
        let mut entity = Entity::new();
        entity.insert("name".into(), Field::String("Alice".into()));
        entity.insert("nickname".into(), Field::String("Al".into()));

        let mut patch = PartialEntity::new();
        patch.insert("name".into(), Some(Field::String("Alicia".into())));
        patch.insert("nickname".into(), None);

        apply_patch(&mut entity, &patch);

        assert_eq!(entity.get("name"), Some(&Field::String("Alicia".into())));
        assert!(!entity.contains_key("nickname"));
    }

    #[test]
    fn test_entity_id_and_json() {
        let id = Uuid::new_v4();
        let mut entity = Entity::new();
        entity.insert(ID_FIELD.into(), Field::Id(id));
        entity.insert("age".into(), Field::Integer(30));

        assert_eq!(entity_id(&entity), Some(id));
        assert_eq!(
            entity_to_json(&entity),
            serde_json::json!({"id": id.to_string(), "age": 30})
        );
    }
}
