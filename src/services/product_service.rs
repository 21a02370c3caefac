use std::sync::Arc;

use uuid::Uuid;

use crate::{
    audit,
    dto::products::{
        CategoryList, CreateCategoryRequest, CreateProductRequest, ProductList,
        UpdateProductRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product},
    response::Meta,
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    store::{CatalogStore, NewCategory, NewProduct, ProductFilter, ProductPatch, Store},
};

#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: ProductQuery) -> AppResult<(ProductList, Meta)> {
        let pagination = query.pagination();
        let (page, per_page, _) = pagination.normalize();
        let filter = ProductFilter {
            search: query.q.map(|q| q.trim().to_string()),
            category_id: query.category_id,
            min_price: query.min_price,
            max_price: query.max_price,
            status: None,
            sort_by: query.sort_by.unwrap_or(ProductSortBy::CreatedAt),
            sort_order: query.sort_order.unwrap_or(SortOrder::Desc),
            page: pagination.page_request(),
        };

        let products = self.store.list_products(&filter).await?;
        let meta = Meta::new(page, per_page, products.total);
        Ok((
            ProductList {
                items: products.items,
            },
            meta,
        ))
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Product> {
        self.store
            .find_product(id)
            .await?
            .ok_or(AppError::NotFound("Product"))
    }

    pub async fn create(
        &self,
        actor: &AuthUser,
        payload: CreateProductRequest,
    ) -> AppResult<Product> {
        ensure_admin(actor)?;
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".into()));
        }
        validate_price_and_stock(Some(payload.price), Some(payload.stock))?;

        let product = self
            .store
            .insert_product(NewProduct {
                category_id: payload.category_id,
                name,
                description: payload.description,
                price: payload.price,
                stock: payload.stock,
                status: payload.status.unwrap_or_default(),
            })
            .await?;

        tracing::info!(product_id = %product.id, "product created");
        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "product_create",
            "products",
            serde_json::json!({ "product_id": product.id }),
        )
        .await;

        Ok(product)
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        payload: UpdateProductRequest,
    ) -> AppResult<Product> {
        ensure_admin(actor)?;
        validate_price_and_stock(payload.price, payload.stock)?;
        if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }

        let product = self
            .store
            .update_product(
                id,
                ProductPatch {
                    category_id: payload.category_id,
                    name: payload.name.map(|n| n.trim().to_string()),
                    description: payload.description,
                    price: payload.price,
                    stock: payload.stock,
                    status: payload.status,
                },
            )
            .await?
            .ok_or(AppError::NotFound("Product"))?;

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "product_update",
            "products",
            serde_json::json!({ "product_id": product.id }),
        )
        .await;

        Ok(product)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> AppResult<()> {
        ensure_admin(actor)?;
        if !self.store.delete_product(id).await? {
            return Err(AppError::NotFound("Product"));
        }

        tracing::info!(product_id = %id, "product deleted");
        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "product_delete",
            "products",
            serde_json::json!({ "product_id": id }),
        )
        .await;

        Ok(())
    }

    pub async fn list_categories(&self) -> AppResult<CategoryList> {
        let items = self.store.list_categories().await?;
        Ok(CategoryList { items })
    }

    pub async fn create_category(
        &self,
        actor: &AuthUser,
        payload: CreateCategoryRequest,
    ) -> AppResult<Category> {
        ensure_admin(actor)?;
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".into()));
        }

        let category = self
            .store
            .insert_category(NewCategory {
                name,
                description: payload.description,
            })
            .await?;

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "category_create",
            "categories",
            serde_json::json!({ "category_id": category.id }),
        )
        .await;

        Ok(category)
    }

    pub async fn delete_category(&self, actor: &AuthUser, id: Uuid) -> AppResult<()> {
        ensure_admin(actor)?;
        if !self.store.delete_category(id).await? {
            return Err(AppError::NotFound("Category"));
        }

        audit::record(
            self.store.as_ref(),
            Some(actor.user_id),
            "category_delete",
            "categories",
            serde_json::json!({ "category_id": id }),
        )
        .await;

        Ok(())
    }
}

fn validate_price_and_stock(
    price: Option<rust_decimal::Decimal>,
    stock: Option<i32>,
) -> AppResult<()> {
    if price.is_some_and(|p| p.is_sign_negative() && !p.is_zero()) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    Ok(())
}
