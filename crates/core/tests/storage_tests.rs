// ═══════════════════════════════════════════════════════════════════
// Storage Tests: FileStorage, MemoryStorage, StorageManager,
// credential derivation
// ═══════════════════════════════════════════════════════════════════

use chrono::NaiveDate;

use finance_tracker_core::errors::{AuthError, CoreError};
use finance_tracker_core::identity::credentials::{derive_key, generate_salt, Credential, KdfParams};
use finance_tracker_core::models::holding::Holding;
use finance_tracker_core::storage::file::FileStorage;
use finance_tracker_core::storage::manager::StorageManager;
use finance_tracker_core::storage::memory::MemoryStorage;
use finance_tracker_core::storage::Storage;

/// Cheap Argon2 settings so tests stay fast.
fn fast_params() -> KdfParams {
    KdfParams {
        memory_cost: 64,
        time_cost: 1,
        parallelism: 1,
    }
}

fn sample_holdings() -> Vec<Holding> {
    let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    vec![
        Holding::new("AAPL", "Apple", 10.0, 150.0, d),
        Holding::new("VUAA.L", "Vanguard S&P 500", 4.0, 80.0, d),
    ]
}

// ── FileStorage ─────────────────────────────────────────────────────

mod file_storage {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.save("user-1", "expenses", "[]").unwrap();
        assert_eq!(storage.load("user-1", "expenses").unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("user-1").join("expenses.json").exists());
    }

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.load("nobody", "income").unwrap(), None);
    }

    #[test]
    fn save_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.save("u", "k", r#"[1,2,3]"#).unwrap();
        storage.save("u", "k", r#"[4]"#).unwrap();
        assert_eq!(storage.load("u", "k").unwrap().as_deref(), Some("[4]"));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.save("u", "k", "[]").unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path().join("u"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["k.json"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.save("u", "k", "[]").unwrap();
        storage.remove("u", "k").unwrap();
        storage.remove("u", "k").unwrap();
        assert_eq!(storage.load("u", "k").unwrap(), None);
    }

    #[test]
    fn scopes_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.save("alice", "investments", r#"["a"]"#).unwrap();
        storage.save("bob", "investments", r#"["b"]"#).unwrap();
        assert_eq!(storage.load("alice", "investments").unwrap().as_deref(), Some(r#"["a"]"#));
        assert_eq!(storage.load("bob", "investments").unwrap().as_deref(), Some(r#"["b"]"#));
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        for (scope, key) in [("..", "k"), ("u", "../k"), ("", "k"), ("u", "a\\b")] {
            let err = storage.save(scope, key, "[]").unwrap_err();
            assert!(matches!(err, CoreError::Storage(_)), "{scope}/{key}: {err:?}");
        }
    }
}

// ── MemoryStorage ───────────────────────────────────────────────────

mod memory_storage {
    use super::*;

    #[test]
    fn round_trip_and_remove() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        storage.save("u", "k", "[]").unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.load("u", "k").unwrap().as_deref(), Some("[]"));

        storage.remove("u", "k").unwrap();
        assert!(storage.is_empty());
        storage.remove("u", "k").unwrap();
    }
}

// ── StorageManager ──────────────────────────────────────────────────

mod manager {
    use super::*;

    #[test]
    fn save_and_load_entries() {
        let storage = MemoryStorage::new();
        let holdings = sample_holdings();

        StorageManager::save_entries(&storage, "u", "investments", &holdings).unwrap();
        let loaded: Vec<Holding> = StorageManager::load_entries(&storage, "u", "investments").unwrap();
        assert_eq!(loaded, holdings);
    }

    #[test]
    fn missing_blob_is_empty_list() {
        let storage = MemoryStorage::new();
        let loaded: Vec<Holding> = StorageManager::load_entries(&storage, "u", "investments").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn corrupted_blob_is_a_deserialization_error() {
        let storage = MemoryStorage::new();
        storage.save("u", "investments", "{not json").unwrap();

        let err = StorageManager::load_entries::<Holding>(&storage, "u", "investments").unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[test]
    fn encoded_blob_uses_field_names() {
        let blob = StorageManager::encode(&sample_holdings()).unwrap();
        assert!(blob.contains(r#""purchase_price":150.0"#));
        assert!(blob.contains(r#""date_added":"2024-03-01""#));
    }
}

// ── Credentials ─────────────────────────────────────────────────────

mod credentials {
    use super::*;

    #[test]
    fn default_params() {
        let p = KdfParams::default();
        assert_eq!(p.memory_cost, 19_456);
        assert_eq!(p.time_cost, 2);
        assert_eq!(p.parallelism, 1);
    }

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [7u8; 16];
        let a = derive_key("hunter22", &salt, &fast_params()).unwrap();
        let b = derive_key("hunter22", &salt, &fast_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_salts_different_keys() {
        let a = derive_key("hunter22", &[1u8; 16], &fast_params()).unwrap();
        let b = derive_key("hunter22", &[2u8; 16], &fast_params()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
    }

    #[test]
    fn verify_accepts_only_the_registered_password() {
        let cred = Credential::create("correct horse", fast_params()).unwrap();
        assert!(cred.verify("correct horse").unwrap());
        assert!(!cred.verify("correct horsf").unwrap());
        assert!(!cred.verify("").unwrap());
    }

    #[test]
    fn invalid_params_are_reported() {
        let params = KdfParams {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 1,
        };
        let err = derive_key("pw", &[0u8; 16], &params).unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));
    }

    #[test]
    fn credential_survives_serialization() {
        let cred = Credential::create("s3cret!", fast_params()).unwrap();
        let json = serde_json::to_string(&cred).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        assert!(back.verify("s3cret!").unwrap());
    }
}
