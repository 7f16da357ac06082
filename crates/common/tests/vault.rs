//! Account creation and sign-in over the in-memory store

use common::crypto::{Vault, VaultError};
use common::store::{AuthStore, MemoryStore};

#[tokio::test]
async fn test_sign_in_lifecycle() {
    let store = MemoryStore::new();
    let vault = Vault::new(store.clone());

    let record = vault.create_account("carol", "pa55word").await.unwrap();
    assert!(!vault.is_signed_in());

    assert!(!vault.authenticate("carol", "password").await.unwrap());
    assert_eq!(store.get_auth("carol").await.unwrap().unwrap(), record);

    assert!(vault.authenticate("carol", "pa55word").await.unwrap());
    let session = vault.session().unwrap();
    assert_eq!(session.username(), "carol");
    assert_eq!(session.password(), "pa55word");
    let touched = store.get_auth("carol").await.unwrap().unwrap();
    assert!(touched.last_sign_in >= record.last_sign_in);
    assert_eq!(touched.probe_hash, record.probe_hash);

    vault.sign_out();
    assert!(!vault.is_signed_in());
    vault.sign_out();
}

#[tokio::test]
async fn test_accounts_are_never_overwritten() {
    let vault = Vault::new(MemoryStore::new());
    vault.create_account("dave", "first").await.unwrap();

    let result = vault.create_account("dave", "second").await;
    assert!(matches!(result, Err(VaultError::DuplicateUser(name)) if name == "dave"));
    assert!(vault.authenticate("dave", "first").await.unwrap());
    assert!(!vault.authenticate("dave", "second").await.unwrap());
}
