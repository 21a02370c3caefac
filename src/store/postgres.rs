use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    AuditStore, CartStore, CatalogStore, CheckoutStore, DateRange, NewCategory, NewProduct,
    NewUser, OrderDraft, OrderFilter, OrderPatch, OrderStore, Page, PageRequest, ProductFilter,
    ProductPatch, StockChange, StockPolicy, StoreError, StoreResult, UserStore,
};
use crate::{
    db::{DbPool, OrmConn, create_orm_conn},
    entity::{
        audit_logs::ActiveModel as AuditActive,
        cart_items::{
            ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel,
        },
        categories::{
            ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories,
            Model as CategoryModel,
        },
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        pending_cart_clears::{
            ActiveModel as PendingActive, Column as PendingCol, Entity as PendingCartClears,
            Model as PendingModel,
        },
        products::{
            ActiveModel as ProductActive, Column as ProdCol, Entity as Products,
            Model as ProductModel,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    models::{
        AuditEntry, CartLine, CartLineDetail, Category, MonthlyRevenue, Order, OrderDetail,
        OrderLine, OrderStats, OrderStatus, PaymentStatus, PendingCartClear, Product, User,
    },
    routes::params::{ProductSortBy, SortOrder},
};

/// PostgreSQL-backed store. Entity CRUD and transactions go through SeaORM,
/// joined and aggregate reads through sqlx on the same pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    orm: OrmConn,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        let orm = create_orm_conn(&pool);
        Self { pool, orm }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn orm(&self) -> &OrmConn {
        &self.orm
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = Users::find()
            .filter(UserCol::Email.eq(email))
            .one(&self.orm)
            .await?;
        Ok(user.map(user_from_entity))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let active = UserActive {
            id: Set(Uuid::new_v4()),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            role: Set(user.role),
            created_at: NotSet,
        };
        let user = active
            .insert(&self.orm)
            .await
            .map_err(|err| conflict_or(err, "email"))?;
        Ok(user_from_entity(user))
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Products::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Page<Product>> {
        let mut condition = Condition::all();

        if let Some(search) = filter.search.as_ref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                    .add(Expr::col(ProdCol::Description).ilike(pattern)),
            );
        }
        if let Some(category_id) = filter.category_id {
            condition = condition.add(ProdCol::CategoryId.eq(category_id));
        }
        if let Some(min_price) = filter.min_price {
            condition = condition.add(ProdCol::Price.gte(min_price));
        }
        if let Some(max_price) = filter.max_price {
            condition = condition.add(ProdCol::Price.lte(max_price));
        }
        if let Some(status) = filter.status {
            condition = condition.add(ProdCol::Status.eq(status.as_str()));
        }

        let sort_col = match filter.sort_by {
            ProductSortBy::CreatedAt => ProdCol::CreatedAt,
            ProductSortBy::Price => ProdCol::Price,
            ProductSortBy::Name => ProdCol::Name,
        };

        let mut finder = Products::find().filter(condition);
        finder = match filter.sort_order {
            SortOrder::Asc => finder.order_by_asc(sort_col),
            SortOrder::Desc => finder.order_by_desc(sort_col),
        };

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(filter.page.limit as u64)
            .offset(filter.page.offset as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let now = Utc::now();
        let active = ProductActive {
            id: Set(Uuid::new_v4()),
            category_id: Set(product.category_id),
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price),
            stock: Set(product.stock),
            status: Set(product.status.as_str().to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let product = active
            .insert(&self.orm)
            .await
            .map_err(|err| conflict_or(err, "product name"))?;
        product_from_entity(product)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> StoreResult<Option<Product>> {
        let existing = match Products::find_by_id(id).one(&self.orm).await? {
            Some(p) => p,
            None => return Ok(None),
        };

        let mut active: ProductActive = existing.into();
        if let Some(category_id) = patch.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = patch.price {
            active.price = Set(price);
        }
        if let Some(stock) = patch.stock {
            active.stock = Set(stock);
        }
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }
        active.updated_at = Set(Utc::now().into());

        let product = active
            .update(&self.orm)
            .await
            .map_err(|err| conflict_or(err, "product name"))?;
        product_from_entity(product).map(Some)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let result = Products::delete_by_id(id).exec(&self.orm).await?;
        Ok(result.rows_affected > 0)
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> StoreResult<StockChange> {
        guarded_stock_change(&self.orm, id, delta).await
    }

    async fn low_stock(&self, threshold: i32, page: PageRequest) -> StoreResult<Page<Product>> {
        let finder = Products::find()
            .filter(ProdCol::Stock.lte(threshold))
            .order_by_asc(ProdCol::Stock)
            .order_by_desc(ProdCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(page.limit as u64)
            .offset(page.offset as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let categories = Categories::find()
            .order_by_asc(CategoryCol::Name)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(category_from_entity)
            .collect();
        Ok(categories)
    }

    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let active = CategoryActive {
            id: Set(Uuid::new_v4()),
            name: Set(category.name),
            description: Set(category.description),
            created_at: NotSet,
        };
        let category = active
            .insert(&self.orm)
            .await
            .map_err(|err| conflict_or(err, "category name"))?;
        Ok(category_from_entity(category))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        let result = Categories::delete_by_id(id).exec(&self.orm).await?;
        Ok(result.rows_affected > 0)
    }
}

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    product_id: Uuid,
    name: String,
    price: Decimal,
    stock: i32,
    status: String,
}

#[async_trait]
impl CartStore for PgStore {
    async fn find_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> StoreResult<Option<CartLine>> {
        let line = CartItems::find()
            .filter(CartCol::UserId.eq(user_id))
            .filter(CartCol::ProductId.eq(product_id))
            .one(&self.orm)
            .await?;
        Ok(line.map(cart_line_from_entity))
    }

    async fn upsert_cart_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StoreResult<CartLine> {
        let now = Utc::now();
        let active = CartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let line = CartItems::insert(active)
            .on_conflict(
                OnConflict::columns([CartCol::UserId, CartCol::ProductId])
                    .update_columns([CartCol::Quantity, CartCol::UpdatedAt])
                    .to_owned(),
            )
            .exec_with_returning(&self.orm)
            .await?;
        Ok(cart_line_from_entity(line))
    }

    async fn delete_cart_line(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let result = CartItems::delete_many()
            .filter(CartCol::UserId.eq(user_id))
            .filter(CartCol::ProductId.eq(product_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<CartLineDetail>> {
        let rows = sqlx::query_as::<_, CartWithProductRow>(
            r#"
            SELECT ci.id AS cart_id, ci.quantity, ci.created_at,
                   p.id AS product_id, p.name, p.price, p.stock, p.status
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let status = row
                    .status
                    .parse()
                    .map_err(|e| StoreError::Corrupt(format!("product status: {e}")))?;
                Ok(CartLineDetail {
                    id: row.cart_id,
                    product_id: row.product_id,
                    name: row.name,
                    item_total: CartLineDetail::line_total(row.price, row.quantity),
                    price: row.price,
                    stock: row.stock,
                    status,
                    quantity: row.quantity,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = CartItems::delete_many()
            .filter(CartCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }
}

#[derive(FromRow)]
struct StatsRow {
    total_orders: i64,
    pending_orders: i64,
    delivered_orders: i64,
    cancelled_orders: i64,
    paid_orders: i64,
    total_revenue: Decimal,
}

#[derive(FromRow)]
struct MonthlyRevenueRow {
    month: String,
    order_count: i64,
    revenue: Decimal,
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, draft: &OrderDraft) -> StoreResult<OrderDetail> {
        let txn = self.orm.begin().await?;
        let detail = write_order(&txn, draft).await?;
        txn.commit().await?;
        Ok(detail)
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Orders::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order_id))
            .order_by_asc(OrderItemCol::CreatedAt)
            .order_by_asc(OrderItemCol::ProductName)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_line_from_entity)
            .collect();
        Ok(items)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Page<Order>> {
        let mut condition = Condition::all();
        if let Some(user_id) = filter.user_id {
            condition = condition.add(OrderCol::UserId.eq(user_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }
        if let Some(payment_status) = filter.payment_status {
            condition = condition.add(OrderCol::PaymentStatus.eq(payment_status.as_str()));
        }
        if let Some(from) = filter.range.from {
            condition = condition.add(OrderCol::CreatedAt.gte(from));
        }
        if let Some(to) = filter.range.to {
            condition = condition.add(OrderCol::CreatedAt.lte(to));
        }

        let mut finder = Orders::find().filter(condition);
        finder = match filter.sort_order.as_ref().unwrap_or(&SortOrder::Desc) {
            SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
            SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
        };

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(filter.page.limit as u64)
            .offset(filter.page.offset as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn update_order(&self, id: Uuid, patch: OrderPatch) -> StoreResult<Option<Order>> {
        let existing = match Orders::find_by_id(id).one(&self.orm).await? {
            Some(o) => o,
            None => return Ok(None),
        };

        let mut active: OrderActive = existing.into();
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(payment_status) = patch.payment_status {
            active.payment_status = Set(payment_status.as_str().to_string());
        }
        if let Some(notes) = patch.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(paid_at) = patch.paid_at {
            active.paid_at = Set(Some(paid_at.into()));
        }
        active.updated_at = Set(Utc::now().into());

        let order = active.update(&self.orm).await?;
        order_from_entity(order).map(Some)
    }

    async fn order_stats(&self, range: &DateRange) -> StoreResult<OrderStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT COUNT(*) AS total_orders,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders,
                   COUNT(*) FILTER (WHERE status = 'delivered') AS delivered_orders,
                   COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders,
                   COUNT(*) FILTER (WHERE payment_status = 'paid') AS paid_orders,
                   COALESCE(SUM(total_amount) FILTER (WHERE payment_status = 'paid'), 0)
                       AS total_revenue
            FROM orders
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;

        let average_order_value = if row.paid_orders > 0 {
            (row.total_revenue / Decimal::from(row.paid_orders)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Ok(OrderStats {
            total_orders: row.total_orders,
            pending_orders: row.pending_orders,
            delivered_orders: row.delivered_orders,
            cancelled_orders: row.cancelled_orders,
            paid_orders: row.paid_orders,
            total_revenue: row.total_revenue,
            average_order_value,
        })
    }

    async fn monthly_revenue(&self, range: &DateRange) -> StoreResult<Vec<MonthlyRevenue>> {
        let rows = sqlx::query_as::<_, MonthlyRevenueRow>(
            r#"
            SELECT to_char(date_trunc('month', created_at), 'YYYY-MM') AS month,
                   COUNT(*) AS order_count,
                   COALESCE(SUM(total_amount), 0) AS revenue
            FROM orders
            WHERE payment_status = 'paid'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MonthlyRevenue {
                month: row.month,
                order_count: row.order_count,
                revenue: row.revenue,
            })
            .collect())
    }
}

#[async_trait]
impl CheckoutStore for PgStore {
    async fn commit_checkout(
        &self,
        draft: &OrderDraft,
        policy: StockPolicy,
    ) -> StoreResult<OrderDetail> {
        // Dropping the transaction on an early return rolls it back.
        let txn = self.orm.begin().await?;

        if policy == StockPolicy::Decrement {
            // Lock rows in a stable order so concurrent checkouts cannot deadlock.
            let mut lines: Vec<_> = draft.lines.iter().collect();
            lines.sort_by_key(|line| line.product_id);
            for line in lines {
                match guarded_stock_change(&txn, line.product_id, -line.quantity).await? {
                    StockChange::Applied { .. } => {}
                    StockChange::Insufficient { available } => {
                        return Err(StoreError::StockConflict {
                            product_id: line.product_id,
                            available,
                        });
                    }
                    StockChange::Missing => {
                        return Err(StoreError::StockConflict {
                            product_id: line.product_id,
                            available: 0,
                        });
                    }
                }
            }
        }

        let detail = write_order(&txn, draft).await?;

        CartItems::delete_many()
            .filter(CartCol::UserId.eq(draft.user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(detail)
    }

    async fn insert_order_with_pending_clear(
        &self,
        draft: &OrderDraft,
    ) -> StoreResult<OrderDetail> {
        let txn = self.orm.begin().await?;
        let detail = write_order(&txn, draft).await?;
        write_pending_clear(&txn, &PendingCartClear::for_order(&detail)).await?;
        txn.commit().await?;
        Ok(detail)
    }

    async fn pending_clears(&self, limit: i64) -> StoreResult<Vec<PendingCartClear>> {
        PendingCartClears::find()
            .order_by_asc(PendingCol::CreatedAt)
            .limit(limit as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(pending_from_entity)
            .collect()
    }

    async fn resolve_pending_clear(&self, order_id: Uuid) -> StoreResult<bool> {
        let result = PendingCartClears::delete_by_id(order_id)
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn record_audit(&self, entry: AuditEntry) -> StoreResult<()> {
        let active = AuditActive {
            id: Set(entry.id),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            resource: Set(entry.resource),
            metadata: Set(entry.metadata),
            created_at: Set(entry.created_at.into()),
        };
        active.insert(&self.orm).await?;
        Ok(())
    }
}

async fn guarded_stock_change<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    delta: i32,
) -> StoreResult<StockChange> {
    let mut update = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(delta))
        .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(ProdCol::Id.eq(id));
    if delta < 0 {
        update = update.filter(ProdCol::Stock.gte(-delta));
    } else {
        update = update.filter(ProdCol::Stock.lte(i32::MAX - delta));
    }
    let result = update.exec(conn).await?;

    let current = Products::find_by_id(id).one(conn).await?;
    Ok(match (result.rows_affected, current) {
        (_, None) => StockChange::Missing,
        (0, Some(product)) => StockChange::Insufficient {
            available: product.stock,
        },
        (_, Some(product)) => StockChange::Applied {
            stock: product.stock,
        },
    })
}

async fn write_pending_clear<C: ConnectionTrait>(
    conn: &C,
    pending: &PendingCartClear,
) -> StoreResult<()> {
    let product_ids = serde_json::to_value(&pending.product_ids)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let active = PendingActive {
        order_id: Set(pending.order_id),
        user_id: Set(pending.user_id),
        product_ids: Set(product_ids),
        created_at: Set(pending.created_at.into()),
    };
    PendingCartClears::insert(active)
        .on_conflict(
            OnConflict::column(PendingCol::OrderId)
                .do_nothing()
                .to_owned(),
        )
        .do_nothing()
        .exec(conn)
        .await?;
    Ok(())
}

async fn write_order<C: ConnectionTrait>(conn: &C, draft: &OrderDraft) -> StoreResult<OrderDetail> {
    let now = Utc::now();
    let order = OrderActive {
        id: Set(draft.id),
        user_id: Set(draft.user_id),
        invoice_number: Set(draft.invoice_number.clone()),
        total_amount: Set(draft.total_amount),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
        shipping_address: Set(draft.shipping_address.clone()),
        payment_method: Set(draft.payment_method.clone()),
        notes: Set(draft.notes.clone()),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            created_at: Set(now.into()),
        }
        .insert(conn)
        .await?;
        items.push(order_line_from_entity(item));
    }

    Ok(OrderDetail {
        order: order_from_entity(order)?,
        items,
    })
}

fn conflict_or(err: DbErr, what: &str) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Conflict(what.to_string()),
        _ => StoreError::Orm(err),
    }
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        created_at: model.created_at.with_timezone(&Utc),
        role: model.role,
    }
}

fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn product_from_entity(model: ProductModel) -> StoreResult<Product> {
    let status = model
        .status
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("product status: {e}")))?;
    Ok(Product {
        id: model.id,
        category_id: model.category_id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn cart_line_from_entity(model: CartModel) -> CartLine {
    CartLine {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_from_entity(model: OrderModel) -> StoreResult<Order> {
    let status = model
        .status
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("order status: {e}")))?;
    let payment_status = model
        .payment_status
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("payment status: {e}")))?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        invoice_number: model.invoice_number,
        total_amount: model.total_amount,
        status,
        payment_status,
        shipping_address: model.shipping_address,
        payment_method: model.payment_method,
        notes: model.notes,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_line_from_entity(model: OrderItemModel) -> OrderLine {
    OrderLine {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn pending_from_entity(model: PendingModel) -> StoreResult<PendingCartClear> {
    let product_ids = serde_json::from_value(model.product_ids)
        .map_err(|e| StoreError::Corrupt(format!("pending product ids: {e}")))?;
    Ok(PendingCartClear {
        order_id: model.order_id,
        user_id: model.user_id,
        product_ids,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
