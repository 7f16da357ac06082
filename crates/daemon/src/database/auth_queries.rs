use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use common::crypto::AuthRecord;
use common::store::{AuthStore, StoreError};

use crate::database::types::DTimestamp;
use crate::database::{store_error, Database};

fn fixed<const N: usize>(bytes: Vec<u8>, column: &str) -> Result<[u8; N], sqlx::Error> {
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        sqlx::Error::Decode(
            format!("{} has {} bytes, expected {}", column, bytes.len(), N).into(),
        )
    })
}

impl Database {
    async fn select_auth(&self, username: &str) -> Result<Option<AuthRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT username, kdf_salt, iv, encrypted_probe, probe_hash, last_sign_in
            FROM auth
            WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&**self)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(AuthRecord {
            username: row.try_get("username")?,
            kdf_salt: fixed(row.try_get("kdf_salt")?, "kdf_salt")?,
            iv: fixed(row.try_get("iv")?, "iv")?,
            encrypted_probe: row.try_get("encrypted_probe")?,
            probe_hash: fixed(row.try_get("probe_hash")?, "probe_hash")?,
            last_sign_in: row.try_get::<DTimestamp, _>("last_sign_in")?.into(),
        }))
    }
}

#[async_trait]
impl AuthStore for Database {
    async fn get_auth(&self, username: &str) -> Result<Option<AuthRecord>, StoreError> {
        self.select_auth(username).await.map_err(store_error)
    }

    async fn insert_auth(&self, record: &AuthRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO auth (username, kdf_salt, iv, encrypted_probe, probe_hash, last_sign_in)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.username)
        .bind(record.kdf_salt.as_slice())
        .bind(record.iv.as_slice())
        .bind(record.encrypted_probe.as_slice())
        .bind(record.probe_hash.as_slice())
        .bind(DTimestamp::from(record.last_sign_in))
        .execute(&**self)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(record.username.clone()))
            }
            Err(e) => Err(store_error(e)),
        }
    }

    async fn touch_sign_in(&self, username: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE auth SET last_sign_in = ?1 WHERE username = ?2")
            .bind(DTimestamp::from(at))
            .bind(username)
            .execute(&**self)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(username.to_string()));
        }
        Ok(())
    }
}
