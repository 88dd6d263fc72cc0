use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use migration::schema::{MEDIA, MEDIA_BY_USER, MEDIA_BY_VISIBILITY};
use models::{Media, MediaPayload, Reaction, Visibility};
use store::{LocalStore, StoreError, TransactionMode};
use tracing::{info, instrument};

use crate::errors::{ServiceError, ServiceResult};
use crate::session::Session;

/// One file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct MediaService {
    store: LocalStore,
    inline_limit: usize,
}

impl MediaService {
    pub fn new(store: LocalStore, inline_limit: usize) -> Self {
        Self { store, inline_limit }
    }

    /// Store every file in one transaction; returns the assigned ids.
    #[instrument(skip(self, session, files), fields(owner = %session.email, files = files.len()))]
    pub async fn upload(
        &self,
        session: &Session,
        files: Vec<UploadFile>,
        visibility: Visibility,
    ) -> ServiceResult<Vec<i64>> {
        if files.is_empty() {
            return Err(ServiceError::Validation("no files selected".into()));
        }
        if let Some(bad) = files.iter().find(|f| f.name.trim().is_empty()) {
            return Err(ServiceError::Validation(format!("file name required ({} bytes)", bad.bytes.len())));
        }

        let mut tx = self.store.transaction(&[MEDIA], TransactionMode::ReadWrite).await?;
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let media = Media {
                id: None,
                user_id: session.email.clone(),
                owner_name: session.full_name.clone(),
                name: file.name.trim().to_string(),
                payload: MediaPayload::encode(&file.mime_type, file.bytes, self.inline_limit),
                mime_type: file.mime_type,
                timestamp: Utc::now(),
                visibility,
                details: String::new(),
                comments: Vec::new(),
                likes: BTreeSet::new(),
                dislikes: BTreeSet::new(),
            };
            let key = tx.add(MEDIA, &media)?;
            let id = key
                .as_int()
                .ok_or_else(|| StoreError::InvalidKey { collection: MEDIA.into(), reason: format!("non-integer id {key}") })?;
            ids.push(id);
        }
        tx.commit().await?;
        info!(count = ids.len(), visibility = visibility.as_str(), "media_uploaded");
        Ok(ids)
    }

    /// Public media plus the caller's own, newest first.
    pub async fn gallery(&self, session: &Session) -> ServiceResult<Vec<Media>> {
        let mut tx = self.store.transaction(&[MEDIA], TransactionMode::ReadOnly).await?;
        let public: Vec<Media> = tx.get_all_by_index(MEDIA, MEDIA_BY_VISIBILITY, Visibility::Public.as_str())?;
        let own: Vec<Media> = tx.get_all_by_index(MEDIA, MEDIA_BY_USER, session.email.as_str())?;
        drop(tx);

        let by_id: BTreeMap<i64, Media> =
            public.into_iter().chain(own).filter_map(|m| m.id.map(|id| (id, m))).collect();
        let mut items: Vec<Media> = by_id.into_values().collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    /// Media uploaded by `owner` that the caller may see.
    pub async fn by_owner(&self, session: &Session, owner: &str) -> ServiceResult<Vec<Media>> {
        let items: Vec<Media> = self.store.get_all_by_index(MEDIA, MEDIA_BY_USER, owner).await?;
        Ok(items.into_iter().filter(|m| m.is_visible_to(&session.email)).collect())
    }

    pub async fn get(&self, session: &Session, id: i64) -> ServiceResult<Media> {
        self.store
            .get::<Media>(MEDIA, id)
            .await?
            .filter(|m| m.is_visible_to(&session.email))
            .ok_or_else(|| ServiceError::not_found("media"))
    }

    pub async fn react(&self, session: &Session, id: i64, reaction: Reaction) -> ServiceResult<Media> {
        self.modify(session, id, false, |m| {
            m.react(&session.email, reaction);
            Ok(())
        })
        .await
    }

    pub async fn comment(&self, session: &Session, id: i64, text: &str) -> ServiceResult<Media> {
        self.modify(session, id, false, |m| Ok(m.add_comment(&session.full_name, text)?)).await
    }

    pub async fn edit_details(&self, session: &Session, id: i64, details: &str) -> ServiceResult<Media> {
        self.modify(session, id, true, |m| {
            m.set_details(details);
            Ok(())
        })
        .await
    }

    /// Owner or developer only.
    #[instrument(skip(self, session), fields(by = %session.email))]
    pub async fn delete(&self, session: &Session, id: i64) -> ServiceResult<()> {
        let mut tx = self.store.transaction(&[MEDIA], TransactionMode::ReadWrite).await?;
        let media: Media = tx.get(MEDIA, id)?.ok_or_else(|| ServiceError::not_found("media"))?;
        if !may_manage(session, &media) {
            return Err(ServiceError::Forbidden);
        }
        tx.delete(MEDIA, id)?;
        tx.commit().await?;
        info!(id, "media_deleted");
        Ok(())
    }

    /// Read-modify-write of one record inside a single transaction.
    async fn modify<F>(&self, session: &Session, id: i64, manage: bool, apply: F) -> ServiceResult<Media>
    where
        F: FnOnce(&mut Media) -> ServiceResult<()>,
    {
        let mut tx = self.store.transaction(&[MEDIA], TransactionMode::ReadWrite).await?;
        let mut media: Media = tx
            .get(MEDIA, id)?
            .filter(|m: &Media| m.is_visible_to(&session.email))
            .ok_or_else(|| ServiceError::not_found("media"))?;
        if manage && !may_manage(session, &media) {
            return Err(ServiceError::Forbidden);
        }
        apply(&mut media)?;
        tx.put(MEDIA, &media)?;
        tx.commit().await?;
        Ok(media)
    }
}

fn may_manage(session: &Session, media: &Media) -> bool {
    session.is_developer() || media.user_id == session.email
}
