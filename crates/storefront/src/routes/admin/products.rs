//! Catalog management.
//!
//! Create and update accept either a JSON body or a `multipart/form-data`
//! form whose optional `image` part is stored as the product picture.

use std::collections::BTreeMap;

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::instrument;

use rigshop_core::{Permission, Price, ProductCategory, ProductId};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{RequireStaff, require_permission};
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};
use crate::services::images::StoredImage;
use crate::state::AppState;

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("multipart/form-data"))
}

/// An uploaded file part.
#[derive(Debug)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Text fields and the optional image of a multipart product form.
#[derive(Debug, Default)]
pub struct ProductForm {
    fields: BTreeMap<String, String>,
    image: Option<FilePart>,
}

impl ProductForm {
    /// Drain a multipart body. An empty `image` part counts as no image.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed body.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "image" {
                let file_name = field.file_name().unwrap_or("upload").to_owned();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    form.image = Some(FilePart { file_name, bytes });
                }
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    /// A field that must parse when present; blank counts as absent.
    fn parsed<T>(&self, name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<Option<T>> {
        match self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(raw) => parse(raw)
                .map(Some)
                .ok_or_else(|| AppError::BadRequest(format!("invalid {name}: {raw}"))),
        }
    }

    fn price(&self) -> Result<Option<Price>> {
        self.parsed("price", |raw| raw.parse::<Decimal>().ok().map(Price::new))
    }

    fn stock(&self) -> Result<Option<u32>> {
        self.parsed("stock", |raw| raw.parse::<u32>().ok())
    }

    fn category(&self) -> Result<Option<ProductCategory>> {
        self.parsed("category", |raw| raw.parse::<ProductCategory>().ok())
    }

    /// `specs` is a JSON object; non-string values keep their JSON text.
    fn specs(&self) -> Result<Option<BTreeMap<String, String>>> {
        self.parsed("specs", |raw| {
            let map: BTreeMap<String, Value> = serde_json::from_str(raw).ok()?;
            Some(
                map.into_iter()
                    .map(|(key, value)| match value {
                        Value::String(s) => (key, s),
                        other => (key, other.to_string()),
                    })
                    .collect(),
            )
        })
    }

    /// Build a new product. `name`, `price` and `category` are required.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for missing or unparseable fields.
    pub fn into_new_product(self) -> Result<(NewProduct, Option<FilePart>)> {
        let name = self.text("name").filter(|n| !n.trim().is_empty());
        let price = self.price()?;
        let category = self.category()?;

        let (Some(name), Some(price), Some(category)) = (name, price, category) else {
            return Err(AppError::BadRequest(
                "Missing required fields: name, price, category".to_string(),
            ));
        };

        let product = NewProduct {
            name,
            description: self.text("description"),
            brand: self.text("brand"),
            price,
            category,
            subcategory: self.text("subcategory"),
            stock: self.stock()?.unwrap_or(0),
            image_url: None,
            specs: self.specs()?.unwrap_or_default(),
        };
        Ok((product, self.image))
    }

    /// Build an update from the fields that were sent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for unparseable fields.
    pub fn into_update(self) -> Result<(ProductUpdate, Option<FilePart>)> {
        let update = ProductUpdate {
            name: self.text("name"),
            description: self.text("description"),
            brand: self.text("brand"),
            price: self.price()?,
            category: self.category()?,
            subcategory: self.text("subcategory"),
            stock: self.stock()?,
            image_url: self.text("image_url"),
            specs: self.specs()?,
        };
        Ok((update, self.image))
    }
}

async fn read_form(request: Request, state: &AppState) -> Result<ProductForm> {
    let multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    ProductForm::read(multipart).await
}

async fn store_image(state: &AppState, image: Option<FilePart>) -> Result<Option<StoredImage>> {
    match image {
        Some(file) => Ok(Some(state.images().save(&file.file_name, &file.bytes).await?)),
        None => Ok(None),
    }
}

/// Remove an image saved for a product write that then failed.
async fn discard_image(state: &AppState, image: Option<StoredImage>) {
    if let Some(image) = image
        && let Err(e) = state.images().remove(&image.filename).await
    {
        tracing::warn!(error = %e, filename = %image.filename, "Failed to remove unused image");
    }
}

/// Every product, in stock or not.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    require_permission(user.role, Permission::ManageProducts)?;
    Ok(Json(state.store().list_products(&filter).await?))
}

#[instrument(skip_all, fields(by = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    request: Request,
) -> Result<(StatusCode, Json<Product>)> {
    require_permission(user.role, Permission::ManageProducts)?;

    let (product, image) = if is_multipart(&request) {
        read_form(request, &state).await?.into_new_product()?
    } else {
        let ApiJson(product) = ApiJson::<NewProduct>::from_request(request, &state).await?;
        (product, None)
    };

    let mut product = product.validated()?;
    let stored = store_image(&state, image).await?;
    if let Some(image) = &stored {
        product.image_url = Some(image.url.clone());
    }

    let product = match state.store().create_product(product).await {
        Ok(product) => product,
        Err(e) => {
            discard_image(&state, stored).await;
            return Err(e.into());
        }
    };
    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, user, request), fields(by = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
    request: Request,
) -> Result<Json<Product>> {
    require_permission(user.role, Permission::ManageProducts)?;

    let (mut update, image) = if is_multipart(&request) {
        read_form(request, &state).await?.into_update()?
    } else {
        let ApiJson(update) = ApiJson::<ProductUpdate>::from_request(request, &state).await?;
        (update, None)
    };

    update.validate()?;
    if state.store().get_product(id).await?.is_none() {
        return Err(AppError::NotFound(format!("product {id} not found")));
    }

    let stored = store_image(&state, image).await?;
    if let Some(image) = &stored {
        update.image_url = Some(image.url.clone());
    }

    let product = match state.store().update_product(id, update).await {
        Ok(product) => product,
        Err(e) => {
            discard_image(&state, stored).await;
            return Err(e.into());
        }
    };
    tracing::info!(product_id = %product.id, "Product updated");
    Ok(Json(product))
}

#[instrument(skip(state, user), fields(by = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Value>> {
    require_permission(user.role, Permission::ManageProducts)?;
    if !state.store().delete_product(id).await? {
        return Err(AppError::NotFound(format!("product {id} not found")));
    }
    tracing::info!(product_id = %id, "Product deleted");
    Ok(Json(json!({ "success": true })))
}
