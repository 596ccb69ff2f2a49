//! Macro-generated test suite for storage backend contract validation.
//!
//! The `store_contract_tests!` macro generates a test module that validates
//! any backend implementing `SchemaStore + EntityStore + UsageStore +
//! RateLimitStore` against the behaviour the services rely on.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod harness;
//!
//! use harness::*;
//! use crudly::storage::InMemoryStore;
//!
//! store_contract_tests!(InMemoryStore::new());
//! ```
//!
//! # Generated Tests
//!
//! - `test_schema_round_trip` / `test_duplicate_table_rejected`
//! - `test_tenants_are_isolated`
//! - `test_row_crud`
//! - `test_query_plan_is_applied`
//! - `test_unit_rolls_back_on_drop`
//! - `test_units_on_one_table_serialize`
//! - `test_writes_validated_against_old_schema_fail`
//! - `test_usage_and_limits`

/// Generate a full storage contract test suite.
///
/// `$factory` must evaluate to a fresh backend; it is re-evaluated for each
/// test. The backend must be `'static` so it can be shared behind an `Arc`.
#[macro_export]
macro_rules! store_contract_tests {
    ($factory:expr) => {
        mod store_contract_tests {
            use super::*;
            use crudly::core::validation::{validate_and_normalize_order, validate_entity_filter};
            use crudly::prelude::*;
            use std::time::Duration;

            fn user(name: &str, age: i64) -> (Uuid, Entity) {
                let id = Uuid::new_v4();
                let mut entity = Entity::new();
                entity.insert(ID_FIELD.to_string(), Field::Id(id));
                entity.insert("name".to_string(), Field::String(name.to_string()));
                entity.insert("age".to_string(), Field::Integer(age));
                (id, entity)
            }

            #[tokio::test]
            async fn test_schema_round_trip() {
                let store = $factory;
                store.create_table(TENANT, USERS, &users_schema()).await.unwrap();

                let fetched = store.fetch_schema(TENANT, USERS).await.unwrap();
                assert_eq!(fetched, Some(users_schema()));

                let all = store.list_schemas(TENANT).await.unwrap();
                assert_eq!(all.get(USERS), Some(&users_schema()));
            }

            #[tokio::test]
            async fn test_duplicate_table_rejected() {
                let store = $factory;
                store.create_table(TENANT, USERS, &users_schema()).await.unwrap();

                let err = store
                    .create_table(TENANT, USERS, &TableSchema::new())
                    .await
                    .unwrap_err();
                assert!(matches!(err, CrudlyError::Table(TableError::AlreadyExists { .. })));
            }

            #[tokio::test]
            async fn test_tenants_are_isolated() {
                let store = $factory;
                store.create_table("a", USERS, &users_schema()).await.unwrap();
                store.create_table("b", USERS, &TableSchema::new()).await.unwrap();

                let (id, entity) = user("Alice", 30);
                store.insert("a", USERS, &users_schema(), id, entity).await.unwrap();

                assert!(store.fetch("b", USERS, id).await.unwrap().is_none());
                assert_eq!(store.count("b", USERS, &[]).await.unwrap(), 0);
                assert_eq!(
                    store.fetch_schema("b", USERS).await.unwrap(),
                    Some(TableSchema::new())
                );
            }

            #[tokio::test]
            async fn test_row_crud() {
                let store = $factory;
                store.create_table(TENANT, USERS, &users_schema()).await.unwrap();
                let (id, entity) = user("Alice", 30);

                store
                    .insert(TENANT, USERS, &users_schema(), id, entity.clone())
                    .await
                    .unwrap();
                assert_eq!(store.fetch(TENANT, USERS, id).await.unwrap(), Some(entity));

                let mut patch = PartialEntity::new();
                patch.insert("age".to_string(), Some(Field::Integer(31)));
                let updated = store
                    .update(TENANT, USERS, &users_schema(), id, &patch)
                    .await
                    .unwrap()
                    .expect("row exists");
                assert_eq!(updated["age"], Field::Integer(31));
                assert_eq!(updated["name"], Field::String("Alice".to_string()));

                assert!(store.delete(TENANT, USERS, id).await.unwrap());
                assert!(store.fetch(TENANT, USERS, id).await.unwrap().is_none());
            }

            #[tokio::test]
            async fn test_query_plan_is_applied() {
                let store = $factory;
                store.create_table(TENANT, USERS, &users_schema()).await.unwrap();
                let rows = vec![
                    user("Ann", 17),
                    user("Bob", 42),
                    user("Cid", 18),
                    user("Dee", 42),
                    user("Eve", 65),
                ];
                store
                    .insert_many(TENANT, USERS, &users_schema(), rows)
                    .await
                    .unwrap();

                let schema = users_schema();
                let filter = validate_entity_filter(&filter(&["age>=18"]), &schema).unwrap();
                let order = validate_and_normalize_order(&[OrderEntry::desc("age")], &schema)
                    .unwrap();
                let plan = build_query_plan(&filter, &order, PaginationParams::new(2, 1));

                let page = store.query(TENANT, USERS, &plan).await.unwrap();
                assert_eq!(page.len(), 2);
                assert_eq!(page[0]["age"], Field::Integer(42));
                assert_eq!(page[1]["age"], Field::Integer(42));
                assert!(page[0]["id"].compare(&page[1]["id"]).unwrap().is_lt());

                let total = store.count(TENANT, USERS, &plan.predicates).await.unwrap();
                assert_eq!(total, 4);
            }

            #[tokio::test]
            async fn test_unit_rolls_back_on_drop() {
                let store = $factory;
                store.create_table(TENANT, USERS, &users_schema()).await.unwrap();
                let (id, entity) = user("Alice", 30);
                store
                    .insert(TENANT, USERS, &users_schema(), id, entity)
                    .await
                    .unwrap();

                {
                    let mut unit = store.begin(TENANT, USERS).await.unwrap().expect("table exists");
                    unit.alter_columns(&ColumnChange::Drop {
                        name: "age".to_string(),
                    })
                    .await
                    .unwrap();
                }

                let row = store.fetch(TENANT, USERS, id).await.unwrap().unwrap();
                assert_eq!(row["age"], Field::Integer(30));
            }

            #[tokio::test]
            async fn test_units_on_one_table_serialize() {
                let store: Arc<dyn SchemaStore> = Arc::new($factory);
                store.create_table(TENANT, USERS, &TableSchema::new()).await.unwrap();
                let manager = SchemaEvolutionManager::new(store.clone());

                let handles: Vec<_> = (0..8)
                    .map(|i| {
                        let manager = manager.clone();
                        tokio::spawn(async move {
                            manager
                                .add_field(
                                    TENANT,
                                    USERS,
                                    &format!("field_{}", i),
                                    FieldDefinition::optional(FieldType::Integer),
                                    None,
                                )
                                .await
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }

                let schema = store.fetch_schema(TENANT, USERS).await.unwrap().unwrap();
                assert_eq!(schema.len(), 8);
            }

            #[tokio::test]
            async fn test_writes_validated_against_old_schema_fail() {
                let store = Arc::new($factory);
                store.create_table(TENANT, USERS, &users_schema()).await.unwrap();
                let manager = SchemaEvolutionManager::new(store.clone());
                let (id, alice) = user("Alice", 30);
                store
                    .insert(TENANT, USERS, &users_schema(), id, alice)
                    .await
                    .unwrap();

                // A required field lands after the row was validated
                let with_nickname = manager
                    .add_field(
                        TENANT,
                        USERS,
                        "nickname",
                        FieldDefinition::required(FieldType::String),
                        Some(serde_json::json!("anon")),
                    )
                    .await
                    .unwrap();

                let (bob_id, bob) = user("Bob", 20);
                let err = store
                    .insert(TENANT, USERS, &users_schema(), bob_id, bob.clone())
                    .await
                    .unwrap_err();
                assert!(matches!(err, CrudlyError::Table(TableError::SchemaChanged { .. })));
                let err = store
                    .insert_many(TENANT, USERS, &users_schema(), vec![(bob_id, bob)])
                    .await
                    .unwrap_err();
                assert_eq!(err.error_code(), "TABLE_SCHEMA_CHANGED");
                assert!(store.fetch(TENANT, USERS, bob_id).await.unwrap().is_none());

                // A field is deleted after the patch was validated
                manager.delete_field(TENANT, USERS, "age").await.unwrap();

                let mut patch = PartialEntity::new();
                patch.insert("age".to_string(), Some(Field::Integer(31)));
                let err = store
                    .update(TENANT, USERS, &with_nickname, id, &patch)
                    .await
                    .unwrap_err();
                assert!(matches!(err, CrudlyError::Table(TableError::SchemaChanged { .. })));

                let row = store.fetch(TENANT, USERS, id).await.unwrap().unwrap();
                assert!(!row.contains_key("age"));
                assert_eq!(row["nickname"], Field::String("anon".to_string()));
            }

            #[tokio::test]
            async fn test_usage_and_limits() {
                let store = $factory;
                let window = Duration::from_secs(3600);

                assert_eq!(store.current_count(TENANT).await.unwrap(), 0);
                assert_eq!(store.increment(TENANT, window).await.unwrap(), 1);
                assert_eq!(store.increment(TENANT, window).await.unwrap(), 2);
                assert_eq!(store.current_count(TENANT).await.unwrap(), 2);

                assert_eq!(store.daily_limit(TENANT).await.unwrap(), None);
                store.set_daily_limit(TENANT, 5).await.unwrap();
                assert_eq!(store.daily_limit(TENANT).await.unwrap(), Some(5));
            }
        }
    };
}
