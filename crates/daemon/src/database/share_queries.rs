use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use common::crypto::Nonce;
use common::identifier::{InfoHash, ShortToken};
use common::share::{ContentBlob, Identifier, Share, ShareId, ShareKind};
use common::store::{ShareStore, StoreError};

use crate::database::types::{DTimestamp, DUuid};
use crate::database::{store_error, Database};

fn decode_error(error: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(error.to_string().into())
}

fn share_from_row(row: &SqliteRow) -> Result<Share, sqlx::Error> {
    let kind: String = row.try_get("type")?;
    let nonce: Option<String> = row.try_get("nonce")?;
    Ok(Share {
        id: row.try_get::<DUuid, _>("id")?.into(),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        notes: row.try_get("notes")?,
        expires_at: row
            .try_get::<Option<DTimestamp>, _>("expires_at")?
            .map(Into::into),
        kind: kind.parse::<ShareKind>().map_err(decode_error)?,
        encrypted: row.try_get("encrypted")?,
        nonce: nonce
            .map(|n| Nonce::from_base64(&n))
            .transpose()
            .map_err(decode_error)?,
        enabled: row.try_get("enabled")?,
        self_destruct: row.try_get("self_destruct")?,
    })
}

const SELECT_SHARE: &str = r#"
    SELECT id, name, description, notes, expires_at, type, encrypted, nonce, enabled, self_destruct
    FROM links
"#;

impl Database {
    async fn select_share(&self, id: ShareId) -> Result<Option<Share>, sqlx::Error> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_SHARE))
            .bind(DUuid::from(id))
            .fetch_optional(&**self)
            .await?;
        row.as_ref().map(share_from_row).transpose()
    }

    async fn select_shares(&self, enabled_only: bool) -> Result<Vec<Share>, sqlx::Error> {
        let filter = if enabled_only { "WHERE enabled = 1" } else { "" };
        let rows = sqlx::query(&format!("{} {} ORDER BY id", SELECT_SHARE, filter))
            .fetch_all(&**self)
            .await?;
        rows.iter().map(share_from_row).collect()
    }

    async fn write_share(&self, share: &Share, content: &ContentBlob) -> Result<(), sqlx::Error> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO links
                (id, name, description, notes, expires_at, type, encrypted, nonce, enabled, self_destruct)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(DUuid::from(share.id))
        .bind(&share.name)
        .bind(&share.description)
        .bind(&share.notes)
        .bind(share.expires_at.map(DTimestamp::from))
        .bind(share.kind.to_string())
        .bind(share.encrypted)
        .bind(share.nonce.map(|n| n.to_base64()))
        .bind(share.enabled)
        .bind(share.self_destruct)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO content (id, eshare_id, blob) VALUES (?1, ?2, ?3)")
            .bind(DUuid::from(content.id))
            .bind(DUuid::from(content.share_id))
            .bind(content.bytes.as_slice())
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    async fn select_content(&self, share_id: ShareId) -> Result<Option<ContentBlob>, sqlx::Error> {
        let row = sqlx::query("SELECT id, eshare_id, blob FROM content WHERE eshare_id = ?1")
            .bind(DUuid::from(share_id))
            .fetch_optional(&**self)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ContentBlob {
            id: row.try_get::<DUuid, _>("id")?.into(),
            share_id: row.try_get::<DUuid, _>("eshare_id")?.into(),
            bytes: row.try_get("blob")?,
        }))
    }

    async fn upsert_identifier(&self, identifier: &Identifier) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO magnets (id, eshare_id, info_hash, short_token, magnet)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(eshare_id) DO UPDATE SET
                info_hash = excluded.info_hash,
                short_token = excluded.short_token,
                magnet = excluded.magnet
            "#,
        )
        .bind(DUuid::from(Uuid::new_v4()))
        .bind(DUuid::from(identifier.share_id))
        .bind(identifier.info_hash.to_hex())
        .bind(identifier.short_token.as_str())
        .bind(&identifier.magnet_uri)
        .execute(&**self)
        .await?;
        Ok(())
    }

    async fn select_identifier(&self, share_id: ShareId) -> Result<Option<Identifier>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT eshare_id, info_hash, short_token, magnet FROM magnets WHERE eshare_id = ?1",
        )
        .bind(DUuid::from(share_id))
        .fetch_optional(&**self)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let info_hash: String = row.try_get("info_hash")?;
        let short_token: String = row.try_get("short_token")?;
        Ok(Some(Identifier {
            share_id: row.try_get::<DUuid, _>("eshare_id")?.into(),
            info_hash: InfoHash::from_hex(&info_hash).map_err(decode_error)?,
            short_token: ShortToken::parse(&short_token).map_err(decode_error)?,
            magnet_uri: row.try_get("magnet")?,
        }))
    }

    /// Remove a share and everything hanging off it in one transaction
    async fn delete_cascade(&self, id: ShareId) -> Result<(), sqlx::Error> {
        let id = DUuid::from(id);
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM content WHERE eshare_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM magnets WHERE eshare_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM links WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
}

#[async_trait]
impl ShareStore for Database {
    async fn insert_share(&self, share: &Share, content: &ContentBlob) -> Result<(), StoreError> {
        match self.write_share(share, content).await {
            Ok(()) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Duplicate(share.id.to_string()))
            }
            Err(e) => Err(store_error(e)),
        }
    }

    async fn get_share(&self, id: ShareId) -> Result<Option<Share>, StoreError> {
        self.select_share(id).await.map_err(store_error)
    }

    async fn list_shares(&self) -> Result<Vec<Share>, StoreError> {
        self.select_shares(false).await.map_err(store_error)
    }

    async fn list_enabled_shares(&self) -> Result<Vec<Share>, StoreError> {
        self.select_shares(true).await.map_err(store_error)
    }

    async fn set_enabled(&self, id: ShareId, enabled: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE links SET enabled = ?1 WHERE id = ?2")
            .bind(enabled)
            .bind(DUuid::from(id))
            .execute(&**self)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(id.to_string()));
        }
        Ok(())
    }

    async fn content_for(&self, share_id: ShareId) -> Result<Option<ContentBlob>, StoreError> {
        self.select_content(share_id).await.map_err(store_error)
    }

    async fn put_identifier(&self, identifier: &Identifier) -> Result<(), StoreError> {
        match self.upsert_identifier(identifier).await {
            Ok(()) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(StoreError::Missing(identifier.share_id.to_string()))
            }
            Err(e) => Err(store_error(e)),
        }
    }

    async fn identifier_for(&self, share_id: ShareId) -> Result<Option<Identifier>, StoreError> {
        self.select_identifier(share_id).await.map_err(store_error)
    }

    async fn delete_share(&self, id: ShareId) -> Result<(), StoreError> {
        self.delete_cascade(id).await.map_err(store_error)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::engine::{LoopbackEngine, LoopbackSwarm};
    use common::share::{NewShare, ShareManager, ShareManagerConfig};

    async fn setup_test_db() -> Database {
        let db_url = url::Url::parse("sqlite::memory:").unwrap();
        Database::connect(&db_url).await.unwrap()
    }

    fn sample_share() -> (Share, ContentBlob) {
        let share = Share {
            id: Uuid::new_v4(),
            name: "notes.txt".to_string(),
            description: "meeting notes".to_string(),
            notes: Some("read before friday".to_string()),
            expires_at: Some(
                Utc.with_ymd_and_hms(2031, 5, 4, 12, 30, 0).unwrap()
                    + Duration::nanoseconds(123_456_789),
            ),
            kind: ShareKind::File,
            encrypted: true,
            nonce: Some(Nonce::generate().unwrap()),
            enabled: true,
            self_destruct: Some(false),
        };
        let blob = ContentBlob {
            id: Uuid::new_v4(),
            share_id: share.id,
            bytes: vec![1, 2, 3, 4],
        };
        (share, blob)
    }

    fn sample_identifier(share_id: ShareId) -> Identifier {
        let info_hash = InfoHash::from_hex("c9e15763f722f23e98a29decdfae341b98d53056").unwrap();
        Identifier {
            share_id,
            short_token: info_hash.to_token(),
            magnet_uri: format!("magnet:?xt=urn:btih:{}", info_hash.to_hex()),
            info_hash,
        }
    }

    #[tokio::test]
    async fn test_share_round_trip() {
        let db = setup_test_db().await;
        let (share, blob) = sample_share();
        db.insert_share(&share, &blob).await.unwrap();

        let stored = db.get_share(share.id).await.unwrap().unwrap();
        assert_eq!(stored, share);
        // metadata must be byte-identical or the info-hash changes on resume
        assert_eq!(stored.to_metadata().unwrap(), share.to_metadata().unwrap());

        let content = db.content_for(share.id).await.unwrap().unwrap();
        assert_eq!(content.bytes, blob.bytes);
        assert_eq!(content.id, blob.id);

        assert!(db.get_share(Uuid::new_v4()).await.unwrap().is_none());
        assert!(db.content_for(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_share() {
        let db = setup_test_db().await;
        let (share, blob) = sample_share();
        db.insert_share(&share, &blob).await.unwrap();

        let result = db.insert_share(&share, &blob).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_insert_is_atomic() {
        let db = setup_test_db().await;
        let (first, blob) = sample_share();
        db.insert_share(&first, &blob).await.unwrap();

        // fresh share id but the content row id collides
        let (mut second, _) = sample_share();
        second.id = Uuid::new_v4();
        let clash = ContentBlob {
            id: blob.id,
            share_id: second.id,
            bytes: vec![9],
        };
        assert!(db.insert_share(&second, &clash).await.is_err());
        assert!(db.get_share(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enabled_filter() {
        let db = setup_test_db().await;
        let (a, a_blob) = sample_share();
        let (b, b_blob) = sample_share();
        db.insert_share(&a, &a_blob).await.unwrap();
        db.insert_share(&b, &b_blob).await.unwrap();

        db.set_enabled(b.id, false).await.unwrap();
        assert_eq!(db.list_shares().await.unwrap().len(), 2);

        let enabled = db.list_enabled_shares().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, a.id);

        let missing = db.set_enabled(Uuid::new_v4(), true).await;
        assert!(matches!(missing, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_identifier_upsert() {
        let db = setup_test_db().await;
        let (share, blob) = sample_share();
        db.insert_share(&share, &blob).await.unwrap();
        assert!(db.identifier_for(share.id).await.unwrap().is_none());

        let identifier = sample_identifier(share.id);
        db.put_identifier(&identifier).await.unwrap();
        assert_eq!(db.identifier_for(share.id).await.unwrap().unwrap(), identifier);

        let mut replaced = identifier.clone();
        replaced.magnet_uri.push_str("&dn=notes");
        db.put_identifier(&replaced).await.unwrap();
        assert_eq!(db.identifier_for(share.id).await.unwrap().unwrap(), replaced);

        let orphan = sample_identifier(Uuid::new_v4());
        let result = db.put_identifier(&orphan).await;
        assert!(matches!(result, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let db = setup_test_db().await;
        let (share, blob) = sample_share();
        db.insert_share(&share, &blob).await.unwrap();
        db.put_identifier(&sample_identifier(share.id)).await.unwrap();

        db.delete_share(share.id).await.unwrap();
        assert!(db.get_share(share.id).await.unwrap().is_none());
        assert!(db.content_for(share.id).await.unwrap().is_none());
        assert!(db.identifier_for(share.id).await.unwrap().is_none());

        // already gone
        db.delete_share(share.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_over_sqlite() {
        let db = setup_test_db().await;
        let swarm = LoopbackSwarm::default();
        let manager = ShareManager::new(
            db.clone(),
            LoopbackEngine::new(swarm.clone()),
            ShareManagerConfig::default(),
        );

        let new = NewShare::new("secret.txt", ShareKind::File)
            .expires_at(Utc::now() + Duration::hours(1))
            .encrypted(true);
        let created = manager
            .create_share(new, b"attack at dawn".to_vec(), Some("pw"))
            .await
            .unwrap();
        let stored = db.identifier_for(created.share.id).await.unwrap().unwrap();
        assert_eq!(stored, created.identifier);

        manager.shutdown().await;
        let report = manager.resume_all().await.unwrap();
        assert_eq!(report.resumed, vec![created.share.id]);
        let resumed = db.identifier_for(created.share.id).await.unwrap().unwrap();
        assert_eq!(resumed.info_hash, created.identifier.info_hash);

        let fetched = manager
            .fetch_share(&created.link.to_string(), Some("pw"))
            .await
            .unwrap();
        assert_eq!(fetched.content, b"attack at dawn");

        manager.destroy_share(created.share.id).await.unwrap();
        assert!(db.list_shares().await.unwrap().is_empty());
    }
}
