use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

use super::{deserialize_optional_nullable, is_http_url};

pub const PRODUCT_NAME_MAX_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub download_link: String,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// What a buyer sees about a product after a successful claim. The download
/// link travels separately so it can only ever appear on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedProduct {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl From<&Product> for ClaimedProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            image_url: product.image_url.clone(),
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
    }
    if name.chars().count() > PRODUCT_NAME_MAX_LEN {
        return Err(AppError::BadRequest(msg::NAME_TOO_LONG.into()));
    }
    Ok(())
}

fn validate_download_link(link: &str) -> Result<()> {
    if !is_http_url(link) {
        return Err(AppError::BadRequest(msg::DOWNLOAD_LINK_INVALID.into()));
    }
    Ok(())
}

fn validate_image_url(url: Option<&str>) -> Result<()> {
    if let Some(url) = url
        && !is_http_url(url)
    {
        return Err(AppError::BadRequest(msg::IMAGE_URL_INVALID.into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub download_link: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CreateProduct {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_download_link(&self.download_link)?;
        validate_image_url(self.image_url.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub description: Option<Option<String>>,
    pub download_link: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub image_url: Option<Option<String>>,
}

impl UpdateProduct {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.name {
            validate_name(name)?;
        }
        if let Some(ref link) = self.download_link {
            validate_download_link(link)?;
        }
        if let Some(ref image_url) = self.image_url {
            validate_image_url(image_url.as_deref())?;
        }
        Ok(())
    }
}
