//! Editor for the singleton pages (`about`, `contact`). One row per slug,
//! always written by upsert on the slug, never by a generated id.

use std::sync::Arc;

use domains::{DataClient, PageContent, PageSlug, Record, Row};
use tracing::{error, info};

use crate::fetch::{DocumentFetcher, FetchError};
use crate::manager::ManagerError;
use crate::schema::{ContentSchema, FormError, FormState};

pub struct PageManager {
    slug: PageSlug,
    schema: Arc<ContentSchema>,
    client: Arc<dyn DataClient>,
    document: DocumentFetcher<Row>,
    form: FormState,
}

impl PageManager {
    pub fn new(slug: PageSlug, schema: Arc<ContentSchema>, client: Arc<dyn DataClient>) -> Self {
        let document = DocumentFetcher::new(Arc::clone(&client), PageContent::TABLE, slug.as_str());
        let form = schema.empty_form();
        Self {
            slug,
            schema,
            client,
            document,
            form,
        }
    }

    pub fn slug(&self) -> PageSlug {
        self.slug
    }

    pub fn schema(&self) -> &ContentSchema {
        &self.schema
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Reads the stored page into the form. A page that was never saved
    /// loads as the empty template.
    pub async fn load(&mut self) -> Result<&FormState, FetchError> {
        let state = self.document.fetch().await;
        self.form = match (state.data, state.error) {
            (Some(row), _) => self.schema.form_from_row(&row),
            (None, Some(FetchError::NotFound)) => self.schema.empty_form(),
            (None, Some(e)) => return Err(e),
            (None, None) => self.schema.empty_form(),
        };
        Ok(&self.form)
    }

    pub fn set_field(&mut self, key: &str, input: &str) -> Result<(), FormError> {
        self.form.set_input(key, input)
    }

    pub fn fill(&mut self, input: &Row) -> Result<(), FormError> {
        self.form.fill(input)
    }

    /// Upserts the page. The form keeps its values afterwards: a singleton
    /// page has no "empty" state to return to.
    pub async fn save(&mut self) -> Result<(), ManagerError> {
        self.schema.validate(&self.form)?;
        let mut row = self.form.to_row();
        row.insert("id".into(), self.slug.as_str().into());

        match self.client.upsert(PageContent::TABLE, "id", row).await {
            Ok(()) => {
                info!(page = self.slug.as_str(), "page saved");
                Ok(())
            }
            Err(source) => {
                error!(page = self.slug.as_str(), error = %source, "page save failed");
                Err(ManagerError::Write {
                    table: PageContent::TABLE.to_string(),
                    source,
                })
            }
        }
    }
}
