//! The `fluence_default_images` data source.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::api::FluenceApi;
use crate::framework::{
    Attribute, AttributeKind, DataSource, Diagnostic, Diagnostics, FrameworkFuture, Schema,
    encode_model,
};
use crate::models::DefaultImage;

/// Data source type name.
pub const TYPE_NAME: &str = "fluence_default_images";

#[derive(Debug, Serialize)]
struct ImageEntry {
    id: String,
    name: String,
    distribution: String,
    slug: String,
    download_url: String,
    username: String,
    created_at: String,
    updated_at: String,
}

impl From<DefaultImage> for ImageEntry {
    fn from(image: DefaultImage) -> Self {
        Self {
            id: image.id,
            name: image.name,
            distribution: image.distribution,
            slug: image.slug,
            download_url: image.download_url,
            username: image.username,
            created_at: image.created_at,
            updated_at: image.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImagesState {
    images: Vec<ImageEntry>,
}

/// Schema of the `fluence_default_images` data source.
#[must_use]
pub fn schema() -> Schema {
    Schema::new(
        "Fetch list of default OS images",
        vec![
            Attribute::computed(
                "images",
                AttributeKind::ListNested(vec![
                    Attribute::computed("id", AttributeKind::String).describe("Image ID"),
                    Attribute::computed("name", AttributeKind::String).describe("Image name"),
                    Attribute::computed("distribution", AttributeKind::String)
                        .describe("OS distribution"),
                    Attribute::computed("slug", AttributeKind::String)
                        .describe("Image slug identifier"),
                    Attribute::computed("download_url", AttributeKind::String)
                        .describe("Image download URL"),
                    Attribute::computed("username", AttributeKind::String)
                        .describe("Default username for the image"),
                    Attribute::computed("created_at", AttributeKind::String)
                        .describe("Image creation timestamp"),
                    Attribute::computed("updated_at", AttributeKind::String)
                        .describe("Image last update timestamp"),
                ]),
            )
            .describe("List of available default OS images"),
        ],
    )
}

/// Lists default OS images.
pub struct DefaultImagesDataSource {
    api: Arc<dyn FluenceApi>,
}

impl DefaultImagesDataSource {
    /// Creates the data source around a shared API handle.
    #[must_use]
    pub fn new(api: Arc<dyn FluenceApi>) -> Self {
        Self { api }
    }

    async fn read_images(&self) -> Result<Value, Diagnostics> {
        let images = self.api.default_images().await.map_err(|err| {
            Diagnostics::from(Diagnostic::client_error("read default images", &err))
        })?;
        encode_model(&ImagesState {
            images: images.into_iter().map(ImageEntry::from).collect(),
        })
    }
}

impl DataSource for DefaultImagesDataSource {
    fn read(&self, _config: Value) -> FrameworkFuture<'_, Value> {
        Box::pin(self.read_images())
    }
}
