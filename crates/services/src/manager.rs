//! # Content Manager
//!
//! The generic admin controller behind every content type: one form, one
//! list, one backing table. Writes go straight to the data service; the list
//! is only refreshed when the caller asks for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use domains::{
    Clock, DataClient, DataError, FetchOptions, Language, ObjectStorage, Row, SessionUser,
};
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::fetch::{CollectionFetcher, FetchState};
use crate::schema::{
    json_to_id, ContentSchema, FormError, FormState, ImageMode, ListItem, SubmitContext, SubmitMode,
};

/// The collaborators every manager needs. Cheap to clone.
#[derive(Clone)]
pub struct Backends {
    pub client: Arc<dyn DataClient>,
    pub storage: Arc<dyn ObjectStorage>,
    /// Bucket that receives uploaded images.
    pub bucket: String,
    pub clock: Arc<dyn Clock>,
}

/// Interactive "are you sure?" step in front of destructive actions.
pub trait Confirmation: Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirmation for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// A file picked in an upload control.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub data: Bytes,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            content_type: None,
        }
    }

    fn mime(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        })
    }

    /// The original file name without any directory part.
    fn base_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .next()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("{0} does not accept uploads")]
    NotAnImageField(String),

    #[error("no files selected")]
    NoFiles,

    #[error("upload to {field} failed: {message}")]
    Failed { field: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ManagerError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("could not save to {table}: {source}")]
    Write {
        table: String,
        #[source]
        source: DataError,
    },

    #[error("could not delete from {table}: {source}")]
    Delete {
        table: String,
        #[source]
        source: DataError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub mode: SubmitMode,
    /// Id of the written row, when the data service reported one.
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

pub struct ContentManager {
    schema: Arc<ContentSchema>,
    backends: Backends,
    list: CollectionFetcher<Row>,
    form: FormState,
    upload_errors: BTreeMap<String, String>,
    scroll_to_top: bool,
}

impl ContentManager {
    pub fn new(schema: Arc<ContentSchema>, backends: Backends) -> Self {
        let list = CollectionFetcher::new(
            Arc::clone(&backends.client),
            schema.table(),
            FetchOptions::ordered(schema.order_by().clone()),
        );
        let form = schema.empty_form();
        Self {
            schema,
            backends,
            list,
            form,
            upload_errors: BTreeMap::new(),
            scroll_to_top: false,
        }
    }

    pub fn schema(&self) -> &ContentSchema {
        &self.schema
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn is_editing(&self) -> bool {
        self.form.is_editing()
    }

    /// Inline error of the last failed upload into `field`, if any.
    pub fn upload_error(&self, field: &str) -> Option<&str> {
        self.upload_errors.get(field).map(String::as_str)
    }

    /// Returns `true` once after `begin_edit`, so the view can jump to the
    /// form.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_top)
    }

    pub fn items(&self) -> FetchState<Vec<Row>> {
        self.list.state()
    }

    /// Re-reads the backing table. Writes made through this manager are not
    /// visible in [`Self::items`] until this is called.
    pub async fn refresh(&self) -> FetchState<Vec<Row>> {
        self.list.refetch().await
    }

    pub fn list_items(&self, lang: Language) -> Vec<ListItem> {
        self.list
            .state()
            .data
            .iter()
            .map(|row| self.schema.summarize(row, lang))
            .collect()
    }

    pub fn set_field(&mut self, key: &str, input: &str) -> Result<(), FormError> {
        self.form.set_input(key, input)
    }

    pub fn fill(&mut self, input: &Row) -> Result<(), FormError> {
        self.form.fill(input)
    }

    /// Loads a stored row into the form and switches to edit mode.
    pub fn begin_edit(&mut self, row: &Row) {
        self.form = self.schema.form_from_row(row);
        self.upload_errors.clear();
        self.scroll_to_top = true;
    }

    pub fn cancel_edit(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.form = self.schema.empty_form();
        self.upload_errors.clear();
    }

    /// Writes the form: update-by-id when editing, insert otherwise. On
    /// success the form goes back to the empty template; on failure it is
    /// left as it was so the user can submit again.
    pub async fn submit(&mut self, user: Option<&SessionUser>) -> Result<SubmitOutcome, ManagerError> {
        self.schema.validate(&self.form)?;

        let mode = if self.form.is_editing() {
            SubmitMode::Update
        } else {
            SubmitMode::Create
        };
        let mut row = self.form.to_row();
        if let Some(hook) = self.schema.before_submit() {
            let ctx = SubmitContext {
                user: user.cloned(),
                now: self.backends.clock.now(),
            };
            hook(&mut row, mode, &ctx);
        }

        let table = self.schema.table();
        let result = match self.form.id() {
            Some(id) => self
                .backends
                .client
                .update(table, id, row)
                .await
                .map(|()| Some(id.to_string())),
            None => self
                .backends
                .client
                .insert(table, row)
                .await
                .map(|stored| stored.get("id").and_then(json_to_id)),
        };

        match result {
            Ok(id) => {
                info!(table, ?mode, id = id.as_deref().unwrap_or("-"), "content saved");
                self.reset();
                Ok(SubmitOutcome { mode, id })
            }
            Err(source) => {
                error!(table, ?mode, error = %source, "content save failed");
                Err(ManagerError::Write {
                    table: table.to_string(),
                    source,
                })
            }
        }
    }

    /// Hard delete after confirmation. The list keeps showing the row until
    /// [`Self::refresh`].
    pub async fn delete(
        &self,
        id: &str,
        confirmation: &dyn Confirmation,
    ) -> Result<DeleteOutcome, ManagerError> {
        let table = self.schema.table();
        if !confirmation.confirm(&format!("Delete {id} from {table}?")) {
            warn!(table, id, "delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        match self.backends.client.delete(table, "id", id).await {
            Ok(()) => {
                info!(table, id, "content deleted");
                Ok(DeleteOutcome::Deleted)
            }
            Err(source) => {
                error!(table, id, error = %source, "content delete failed");
                Err(ManagerError::Delete {
                    table: table.to_string(),
                    source,
                })
            }
        }
    }

    /// Uploads a batch into an image field and writes the resulting public
    /// URLs into the form. The whole batch is awaited first: if any file
    /// fails, nothing is written and the error is kept for that field only.
    /// Files that did upload before the failure stay in the bucket.
    pub async fn upload_images(
        &mut self,
        field: &str,
        mut files: Vec<UploadFile>,
    ) -> Result<Vec<String>, UploadError> {
        let image = self
            .schema
            .image(field)
            .cloned()
            .ok_or_else(|| UploadError::NotAnImageField(field.to_string()))?;
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        if image.mode == ImageMode::Single {
            files.truncate(1);
        }

        let stamp = self.backends.clock.now().timestamp_millis();
        let storage = &self.backends.storage;
        let bucket = self.backends.bucket.as_str();
        let uploads = files.iter().enumerate().map(|(index, file)| {
            let path = format!("{}/{}_{}_{}", image.folder, stamp, index, file.base_name());
            async move {
                storage
                    .upload(bucket, &path, file.data.clone(), &file.mime())
                    .await
                    .map(|()| storage.public_url(bucket, &path))
            }
        });
        let results = join_all(uploads).await;

        let mut urls = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(url) => urls.push(url),
                Err(e) => {
                    error!(field, error = %e, "image upload failed");
                    let err = UploadError::Failed {
                        field: field.to_string(),
                        message: e.to_string(),
                    };
                    self.upload_errors.insert(field.to_string(), err.to_string());
                    return Err(err);
                }
            }
        }

        let written = match image.mode {
            ImageMode::Single => match urls.first() {
                Some(url) => self.form.set_url(field, url.clone()),
                None => Ok(()),
            },
            ImageMode::Multiple => self.form.append_urls(field, urls.clone()),
        };
        written.map_err(|e| UploadError::NotAnImageField(e.to_string()))?;
        self.upload_errors.remove(field);
        info!(field, count = urls.len(), "images uploaded");
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, ImageFieldSpec, Label};
    use chrono::TimeZone;
    use domains::{FixedClock, MockDataClient, MockObjectStorage, StorageError};
    use serde_json::json;
    use storage_adapters::memory::{MemoryDataClient, MemoryObjectStore};

    fn schema() -> Arc<ContentSchema> {
        Arc::new(
            ContentSchema::builder("gallery")
                .field(FieldSpec::number("order", Label::new("Order", "លំដាប់")))
                .field(FieldSpec::text("title", Label::new("Title", "ចំណងជើង")).bilingual())
                .field(FieldSpec::url("thumbnailUrl", Label::new("Thumbnail", "រូបតំណាង")))
                .field(FieldSpec::url_list("imageUrls", Label::new("Images", "រូបភាព")))
                .image(ImageFieldSpec::single("thumbnailUrl", "gallery/thumbnails"))
                .image(ImageFieldSpec::multiple("imageUrls", "gallery"))
                .build()
                .unwrap(),
        )
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(chrono::Utc.with_ymd_and_hms(2024, 4, 13, 8, 0, 0).unwrap()))
    }

    fn backends(client: Arc<dyn DataClient>, storage: Arc<dyn ObjectStorage>) -> Backends {
        Backends {
            client,
            storage,
            bucket: "temple".into(),
            clock: clock(),
        }
    }

    fn memory() -> (Arc<MemoryDataClient>, Backends) {
        let client = Arc::new(MemoryDataClient::new());
        let storage = Arc::new(MemoryObjectStore::new("https://cdn.example"));
        let b = backends(client.clone(), storage);
        (client, b)
    }

    #[tokio::test]
    async fn created_rows_come_back_in_order() {
        let (_, backends) = memory();
        let mut manager = ContentManager::new(schema(), backends);

        manager.set_field("title_en", "B").unwrap();
        manager.set_field("order", "1").unwrap();
        manager.submit(None).await.unwrap();

        manager.set_field("title_en", "A").unwrap();
        manager.set_field("title_km", "ក").unwrap();
        manager.set_field("order", "0").unwrap();
        let outcome = manager.submit(None).await.unwrap();
        assert_eq!(outcome.mode, SubmitMode::Create);
        assert!(outcome.id.is_some());

        let rows = manager.refresh().await.data;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title_en"], "A");
        assert_eq!(rows[0]["title_km"], "ក");
        assert_eq!(rows[0]["order"], 0);
        assert_eq!(rows[1]["title_en"], "B");
    }

    #[tokio::test]
    async fn unchanged_edit_resubmits_identical_values() {
        let stored = json!({
            "id": "a1",
            "order": 3,
            "title_en": "Kathina",
            "title_km": "កឋិន",
            "thumbnailUrl": "https://cdn.example/t.jpg",
            "imageUrls": ["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"],
        });
        let expected = {
            let mut row = stored.as_object().cloned().unwrap();
            row.remove("id");
            row
        };

        let mut mock = MockDataClient::new();
        mock.expect_update()
            .withf(move |table, id, row| table == "gallery" && id == "a1" && *row == expected)
            .times(2)
            .returning(|_, _, _| Ok(()));
        let storage = Arc::new(MemoryObjectStore::new("https://cdn.example"));
        let mut manager = ContentManager::new(schema(), backends(Arc::new(mock), storage));
        let row = stored.as_object().cloned().unwrap();

        manager.begin_edit(&row);
        assert!(manager.take_scroll_request());
        assert!(!manager.take_scroll_request());
        let first = manager.submit(None).await.unwrap();
        assert_eq!(first.mode, SubmitMode::Update);
        assert_eq!(manager.form(), &manager.schema().empty_form());

        manager.begin_edit(&row);
        manager.submit(None).await.unwrap();
        assert!(!manager.is_editing());
    }

    #[tokio::test]
    async fn failed_write_keeps_form_populated() {
        let mut mock = MockDataClient::new();
        mock.expect_insert()
            .returning(|table, _| Err(DataError::backend(table, "timeout")));
        let storage = Arc::new(MemoryObjectStore::new("https://cdn.example"));
        let mut manager = ContentManager::new(schema(), backends(Arc::new(mock), storage));

        manager.set_field("title_en", "Vesak").unwrap();
        let err = manager.submit(None).await.unwrap_err();

        assert!(matches!(err, ManagerError::Write { .. }));
        assert_eq!(manager.form().text("title_en"), "Vesak");
    }

    #[tokio::test]
    async fn delete_requires_confirmation_and_does_not_refresh() {
        let (client, backends) = memory();
        client.seed("gallery", [json!({ "id": "g1", "order": 0, "title_en": "Old" })]);
        let manager = ContentManager::new(schema(), backends);
        assert_eq!(manager.refresh().await.data.len(), 1);

        let cancelled = manager.delete("g1", &|_: &str| false).await.unwrap();
        assert_eq!(cancelled, DeleteOutcome::Cancelled);

        let deleted = manager.delete("g1", &|_: &str| true).await.unwrap();
        assert_eq!(deleted, DeleteOutcome::Deleted);
        assert_eq!(manager.items().data.len(), 1, "list is stale until refresh");
        assert!(manager.refresh().await.data.is_empty());
    }

    #[tokio::test]
    async fn batch_upload_appends_all_urls_in_order() {
        let (_, backends) = memory();
        let mut manager = ContentManager::new(schema(), backends);
        manager
            .set_field("imageUrls", "https://old/1.jpg\nhttps://old/2.jpg")
            .unwrap();

        let urls = manager
            .upload_images(
                "imageUrls",
                vec![
                    UploadFile::new("a.jpg", &b"a"[..]),
                    UploadFile::new("b.jpg", &b"b"[..]),
                    UploadFile::new("c.jpg", &b"c"[..]),
                ],
            )
            .await
            .unwrap();

        let stamp = clock().now().timestamp_millis();
        assert_eq!(urls.len(), 3);
        assert_eq!(
            urls[0],
            format!("https://cdn.example/temple/gallery/{stamp}_0_a.jpg")
        );
        let list = manager.form().list("imageUrls");
        assert_eq!(list.len(), 5);
        assert_eq!(&list[..2], ["https://old/1.jpg", "https://old/2.jpg"]);
        assert_eq!(&list[2..], &urls[..]);
    }

    #[tokio::test]
    async fn files_sharing_a_name_get_distinct_keys() {
        let (_, backends) = memory();
        let mut manager = ContentManager::new(schema(), backends);

        let urls = manager
            .upload_images(
                "imageUrls",
                vec![
                    UploadFile::new("image.jpg", &b"1"[..]),
                    UploadFile::new("image.jpg", &b"2"[..]),
                    UploadFile::new("image.jpg", &b"3"[..]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(urls.len(), 3);
        assert_ne!(urls[0], urls[1]);
        assert_ne!(urls[1], urls[2]);
        assert_eq!(manager.form().list("imageUrls"), urls);
    }

    #[tokio::test]
    async fn one_failed_file_commits_nothing() {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload()
            .returning(|_, path, _, _| {
                if path.ends_with("_b.jpg") {
                    Err(StorageError::Upload {
                        path: path.to_string(),
                        message: "quota exceeded".into(),
                    })
                } else {
                    Ok(())
                }
            });
        storage
            .expect_public_url()
            .returning(|bucket, path| format!("https://cdn.example/{bucket}/{path}"));
        let client = Arc::new(MemoryDataClient::new());
        let mut manager = ContentManager::new(schema(), backends(client, Arc::new(storage)));
        manager.set_field("imageUrls", "https://old/1.jpg").unwrap();

        let err = manager
            .upload_images(
                "imageUrls",
                vec![
                    UploadFile::new("a.jpg", &b"a"[..]),
                    UploadFile::new("b.jpg", &b"b"[..]),
                    UploadFile::new("c.jpg", &b"c"[..]),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Failed { .. }));
        assert_eq!(manager.form().list("imageUrls"), ["https://old/1.jpg"]);
        assert!(manager.upload_error("imageUrls").is_some());
        assert!(manager.upload_error("thumbnailUrl").is_none());
    }

    #[tokio::test]
    async fn single_upload_replaces_the_url() {
        let (_, backends) = memory();
        let mut manager = ContentManager::new(schema(), backends);

        let urls = manager
            .upload_images("thumbnailUrl", vec![UploadFile::new("photos/cover.png", &b"png"[..])])
            .await
            .unwrap();

        assert_eq!(manager.form().text("thumbnailUrl"), urls[0]);
        assert!(urls[0].ends_with("_cover.png"));
        assert_eq!(
            manager.upload_images("title_en", Vec::new()).await,
            Err(UploadError::NotAnImageField("title_en".into()))
        );
    }
}
