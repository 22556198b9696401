//! End-to-end registry behavior through `SchemaService`
//!
//! Each scenario runs against the in-memory backend; the persistence cases
//! also run against the file-system backend.

use std::sync::Arc;

use config_schema_registry::{
    AllowAll, CallerIdentity, EventPublisher, FsBackend, KvBackend, MemoryBackend, SaveSchemaRequest,
    SchemaIdentity, SchemaService, StaticNamespaces, Status, StoreError,
    ValidateConfigurationRequest, VersionedStore,
};
use serde_json::json;
use tempfile::tempdir;

fn service(backend: Arc<dyn KvBackend>) -> SchemaService {
    SchemaService::new(
        VersionedStore::new(backend),
        Arc::new(AllowAll),
        Arc::new(StaticNamespaces::open()),
        EventPublisher::disabled(),
    )
}

fn memory_service() -> SchemaService {
    service(Arc::new(MemoryBackend::new()))
}

fn id(name: &str, version: &str) -> SchemaIdentity {
    SchemaIdentity::new("orgA", "nsA", name, version)
}

fn caller() -> CallerIdentity {
    CallerIdentity::anonymous()
}

async fn save(service: &SchemaService, identity: SchemaIdentity, schema: &str) -> Status {
    service
        .save(
            &caller(),
            &SaveSchemaRequest {
                identity,
                schema: schema.to_string(),
            },
        )
        .await
        .unwrap()
        .status
}

async fn versions(service: &SchemaService, name: &str) -> Vec<String> {
    service
        .list_versions(&caller(), &SchemaIdentity::family("orgA", "nsA", name))
        .await
        .unwrap()
        .payload
        .unwrap_or_default()
        .into_iter()
        .map(|r| r.identity.version_str().to_string())
        .collect()
}

// =============================================================================
// Round trip
// =============================================================================

#[tokio::test]
async fn test_round_trip_yaml_and_json_are_equivalent() {
    let service = memory_service();
    let yaml = "type: object\nproperties:\n  port:\n    type: integer\nrequired: [port]\n";
    let json_doc = r#"{"required":["port"],"properties":{"port":{"type":"integer"}},"type":"object"}"#;

    assert_eq!(save(&service, id("yaml", "v1.0.0"), yaml).await, Status::Ok);
    assert_eq!(save(&service, id("json", "v1.0.0"), json_doc).await, Status::Ok);

    let from_yaml = service.get(&caller(), &id("yaml", "v1.0.0")).await.unwrap().payload.unwrap();
    let from_json = service.get(&caller(), &id("json", "v1.0.0")).await.unwrap().payload.unwrap();

    let expected = json!({"type": "object", "properties": {"port": {"type": "integer"}}, "required": ["port"]});
    assert_eq!(from_yaml.document().unwrap(), expected);
    assert_eq!(from_json.document().unwrap(), expected);
    assert_eq!(from_yaml.checksum, from_json.checksum);
}

#[tokio::test]
async fn test_get_missing_is_ok_without_payload() {
    let service = memory_service();
    let outcome = service.get(&caller(), &id("db", "v1.0.0")).await.unwrap();
    assert_eq!(outcome.status, Status::Ok);
    assert!(outcome.payload.is_none());
    assert_eq!(outcome.message, "No schema with key 'orgA/nsA/db/v1.0.0' found!");
}

// =============================================================================
// Monotonicity and no-overwrite
// =============================================================================

#[tokio::test]
async fn test_monotonic_versions() {
    let service = memory_service();
    assert_eq!(save(&service, id("db", "v1.5.0"), "{}").await, Status::Ok);

    for stale in ["v1.5.0", "v1.4.9", "v1.5.0-rc.1", "v0.9.0", "v1.5.0+build.2"] {
        assert_eq!(
            save(&service, id("db", stale), "{}").await,
            Status::InvalidArgument,
            "{stale} must be rejected"
        );
    }
    assert_eq!(save(&service, id("db", "v1.5.1-alpha"), "{}").await, Status::Ok);
    assert_eq!(save(&service, id("db", "v1.5.1"), "{}").await, Status::Ok);
    assert_eq!(save(&service, id("db", "v2.0.0"), "{}").await, Status::Ok);

    assert_eq!(
        versions(&service, "db").await,
        vec!["v1.5.0", "v1.5.1-alpha", "v1.5.1", "v2.0.0"]
    );
}

#[tokio::test]
async fn test_no_overwrite_keeps_first_document() {
    let backend = MemoryBackend::new();
    let service = service(Arc::new(backend.clone()));
    assert_eq!(save(&service, id("db", "v1.0.0"), r#"{"type":"string"}"#).await, Status::Ok);

    // Bypass the monotonic check to hit the exact-key guard directly.
    let err = service
        .store()
        .save(&id("db", "v1.0.0"), r#"{"type":"integer"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));

    let kept = service.get(&caller(), &id("db", "v1.0.0")).await.unwrap().payload.unwrap();
    assert_eq!(kept.document().unwrap(), json!({"type": "string"}));
    assert_eq!(backend.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_of_one_key_commit_once() {
    let service = memory_service();
    let barrier = Arc::new(tokio::sync::Barrier::new(8));
    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service
                .store()
                .save(&id("race", "v1.0.0"), &format!(r#"{{"title":"writer {i}"}}"#))
                .await
        }));
    }
    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(e) => assert!(matches!(e, StoreError::AlreadyExists { .. }), "{e}"),
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(versions(&service, "race").await, vec!["v1.0.0"]);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_missing_leaves_store_unchanged() {
    let backend = MemoryBackend::new();
    let service = service(Arc::new(backend.clone()));
    assert_eq!(save(&service, id("db", "v1.0.0"), "{}").await, Status::Ok);

    let outcome = service.delete(&caller(), &id("db", "v9.9.9")).await.unwrap();
    assert_eq!(outcome.status, Status::NotFound);
    assert_eq!(backend.len(), 1);

    let outcome = service.delete(&caller(), &id("db", "v1.0.0")).await.unwrap();
    assert_eq!(outcome.status, Status::Ok);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_delete_does_not_cascade() {
    let service = memory_service();
    for v in ["v1.0.0", "v2.0.0"] {
        assert_eq!(save(&service, id("db", v), "{}").await, Status::Ok);
    }
    service.delete(&caller(), &id("db", "v2.0.0")).await.unwrap();
    assert_eq!(versions(&service, "db").await, vec!["v1.0.0"]);
}

// =============================================================================
// Ordering and prefix isolation
// =============================================================================

#[tokio::test]
async fn test_listing_is_ascending() {
    let service = memory_service();
    // Write out of order straight to the store; the service would reject it.
    for v in ["v2.0.0", "v1.0.0", "v1.5.0"] {
        service.store().save(&id("db", v), "{}").await.unwrap();
    }
    assert_eq!(versions(&service, "db").await, vec!["v1.0.0", "v1.5.0", "v2.0.0"]);
}

#[tokio::test]
async fn test_prefix_isolation() {
    let service = memory_service();
    assert_eq!(save(&service, id("foo", "v1.0.0"), "{}").await, Status::Ok);
    assert_eq!(save(&service, id("foobar", "v3.0.0"), "{}").await, Status::Ok);

    assert!(versions(&service, "bar").await.is_empty());
    assert_eq!(versions(&service, "foo").await, vec!["v1.0.0"]);
    assert_eq!(versions(&service, "foobar").await, vec!["v3.0.0"]);

    // foobar's v3.0.0 does not raise foo's floor
    assert_eq!(save(&service, id("foo", "v1.1.0"), "{}").await, Status::Ok);
}

#[tokio::test]
async fn test_empty_family_message() {
    let service = memory_service();
    let outcome = service
        .list_versions(&caller(), &SchemaIdentity::family("orgA", "nsA", "none"))
        .await
        .unwrap();
    assert_eq!(outcome.status, Status::Ok);
    assert_eq!(outcome.message, "No schema with prefix 'orgA/nsA/none' found!");
    assert_eq!(outcome.payload.map(|p| p.len()), Some(0));
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validate_configuration() {
    let service = memory_service();
    assert_eq!(
        save(&service, id("person", "v1.0.0"), r#"{"type":"object","required":["name"]}"#).await,
        Status::Ok
    );

    let validate = |configuration: &str| ValidateConfigurationRequest {
        identity: id("person", "v1.0.0"),
        configuration: configuration.to_string(),
    };

    let outcome = service.validate(&caller(), &validate(r#"{"age":5}"#)).await.unwrap();
    assert_eq!(outcome.status, Status::Ok);
    let result = outcome.payload.unwrap();
    assert!(!result.valid);
    assert!(result.message.contains("name"), "{}", result.message);

    let outcome = service.validate(&caller(), &validate("name: x\n")).await.unwrap();
    let result = outcome.payload.unwrap();
    assert!(result.valid);
    assert_eq!(result.message, "The configuration is valid!");

    let outcome = service.validate(&caller(), &validate("name: [x")).await.unwrap();
    assert_eq!(outcome.status, Status::InvalidArgument);

    let outcome = service.validate(&caller(), &validate("")).await.unwrap();
    assert_eq!(outcome.status, Status::InvalidArgument);
    assert_eq!(outcome.message, "configuration cannot be empty");
}

#[tokio::test]
async fn test_invalid_schema_is_rejected_before_storage() {
    let backend = MemoryBackend::new();
    let service = service(Arc::new(backend.clone()));
    assert_eq!(
        save(&service, id("db", "v1.0.0"), r#"{"type":"not-a-type"}"#).await,
        Status::InvalidArgument
    );
    assert_eq!(save(&service, id("db", "v1.0.0"), "type: [").await, Status::InvalidArgument);
    assert!(backend.is_empty());
}

// =============================================================================
// File-system backend
// =============================================================================

#[tokio::test]
async fn test_fs_backend_persists_across_instances() {
    let dir = tempdir().unwrap();
    {
        let service = service(Arc::new(FsBackend::open(dir.path()).await.unwrap()));
        assert_eq!(save(&service, id("db", "v1.0.0"), "type: string\n").await, Status::Ok);
        assert_eq!(save(&service, id("db", "v1.1.0"), "type: string\nminLength: 1\n").await, Status::Ok);
    }

    let service = service(Arc::new(FsBackend::open(dir.path()).await.unwrap()));
    assert_eq!(versions(&service, "db").await, vec!["v1.0.0", "v1.1.0"]);
    assert_eq!(save(&service, id("db", "v1.0.5"), "{}").await, Status::InvalidArgument);

    let record = service.get(&caller(), &id("db", "v1.1.0")).await.unwrap().payload.unwrap();
    assert_eq!(record.document().unwrap(), json!({"type": "string", "minLength": 1}));

    assert_eq!(service.delete(&caller(), &id("db", "v1.0.0")).await.unwrap().status, Status::Ok);
    assert_eq!(
        service.delete(&caller(), &id("db", "v1.0.0")).await.unwrap().status,
        Status::NotFound
    );
}

#[tokio::test]
async fn test_path_like_names_are_invalid_arguments_on_fs() {
    let dir = tempdir().unwrap();
    let service = service(Arc::new(FsBackend::open(dir.path()).await.unwrap()));

    for name in ["..", ".", "a\\b"] {
        let outcome = service
            .save(
                &caller(),
                &SaveSchemaRequest {
                    identity: id(name, "v1.0.0"),
                    schema: "{}".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.status, Status::InvalidArgument, "{name}");
        assert!(outcome.message.starts_with("name must not"), "{}", outcome.message);

        let outcome = service.get(&caller(), &id(name, "v1.0.0")).await.unwrap();
        assert_eq!(outcome.status, Status::InvalidArgument, "{name}");
    }

    // Same answer whichever backend is configured
    let memory = memory_service();
    assert_eq!(save(&memory, id("..", "v1.0.0"), "{}").await, Status::InvalidArgument);
}
