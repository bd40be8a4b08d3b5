use crate::{
    db::DbPool,
    entities::{customer, order, order_address, order_item, order_note, order_payment, product},
    errors::{is_lock_contention, is_unique_violation, ServiceError},
    middleware_helpers::retry::{with_retry, RetryConfig, WriteConflictPolicy},
    services::{
        money::{from_cents, to_cents, validate_non_negative},
        order_reference::next_order_reference,
        users,
    },
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

fn validate_address_type(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        order_address::BILLING | order_address::SHIPPING => Ok(()),
        _ => Err(validator::ValidationError::new("unknown_address_type")),
    }
}

/// Payment terms submitted with a new order
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PaymentRequest {
    #[validate(range(min = 1, message = "Payment type is required"))]
    pub payment_type_id: i32,
    /// Defaults to the order total
    #[validate(custom = "validate_non_negative")]
    pub amount: Option<Decimal>,
    #[validate(length(equal = 4, message = "Card last digits must be 4 characters"))]
    pub card_last4: Option<String>,
    /// `MM/YY` or `MM/YYYY`
    #[validate(length(min = 5, max = 7))]
    pub card_expiry: Option<String>,
    #[validate(length(max = 64))]
    pub cheque_number: Option<String>,
    #[validate(length(max = 128))]
    pub cheque_bank: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    /// Position of the line; defaults to the 1-based index in the request
    #[validate(range(min = 1))]
    pub line_number: Option<i32>,
    pub product_id: Option<i32>,
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub product_name: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressRequest {
    /// `billing` or `shipping`
    #[validate(custom = "validate_address_type")]
    pub address_type: String,
    #[validate(length(min = 1, max = 255))]
    pub recipient: String,
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 16))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    /// Allocated automatically when absent or blank
    #[validate(length(max = 32))]
    pub order_reference: Option<String>,
    pub customer_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub action_id: Option<i32>,
    /// Defaults to now
    pub order_datetime: Option<DateTime<Utc>>,
    #[validate(custom = "validate_non_negative")]
    pub shipping: Option<Decimal>,
    /// Defaults to the items subtotal plus shipping
    #[validate(custom = "validate_non_negative")]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub is_invoiced: bool,
    pub payment: PaymentRequest,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub addresses: Vec<AddressRequest>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl CreateOrderRequest {
    /// Validates the header and every nested payment, item and address.
    pub fn validate_all(&self) -> Result<(), ServiceError> {
        self.validate()?;
        self.payment.validate()?;
        for item in &self.items {
            item.validate()?;
        }
        for address in &self.addresses {
            address.validate()?;
        }
        Ok(())
    }

    fn supplied_reference(&self) -> Option<String> {
        self.order_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    }
}

/// Partial update of an order header. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    pub customer_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub action_id: Option<i32>,
    pub payment_type_id: Option<i32>,
    pub order_datetime: Option<DateTime<Utc>>,
    /// Recomputes the total from the subtotal unless `total` is also given
    #[validate(custom = "validate_non_negative")]
    pub shipping: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub total: Option<Decimal>,
    pub is_paid: Option<bool>,
    pub is_invoiced: Option<bool>,
    pub is_annulled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddNoteRequest {
    #[validate(length(min = 1, max = 4000))]
    pub note_text: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OrderListFilter {
    pub is_paid: Option<bool>,
    pub is_invoiced: Option<bool>,
    pub is_annulled: Option<bool>,
    pub customer_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: i32,
    pub site_id: i32,
    pub order_reference: String,
    pub customer_id: Option<i32>,
    pub brand_id: Option<i32>,
    pub action_id: Option<i32>,
    pub payment_type_id: Option<i32>,
    pub payment_id: Option<i32>,
    pub order_datetime: DateTime<Utc>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub order_lines: i32,
    pub is_paid: bool,
    pub is_invoiced: bool,
    pub is_annulled: bool,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            order_id: model.order_id,
            site_id: model.site_id,
            order_reference: model.order_reference,
            customer_id: model.customer_id,
            brand_id: model.brand_id,
            action_id: model.action_id,
            payment_type_id: model.payment_type_id,
            payment_id: model.payment_id,
            order_datetime: model.order_datetime,
            subtotal: from_cents(model.subtotal_cents),
            shipping: from_cents(model.shipping_cents),
            total: from_cents(model.total_cents),
            order_lines: model.order_lines,
            is_paid: model.is_paid,
            is_invoiced: model.is_invoiced,
            is_annulled: model.is_annulled,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub payment_id: i32,
    pub order_id: i32,
    pub payment_type_id: i32,
    pub amount: Decimal,
    pub card_last4: Option<String>,
    pub card_expiry: Option<String>,
    pub cheque_number: Option<String>,
    pub cheque_bank: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<order_payment::Model> for PaymentResponse {
    fn from(model: order_payment::Model) -> Self {
        Self {
            payment_id: model.payment_id,
            order_id: model.order_id,
            payment_type_id: model.payment_type_id,
            amount: from_cents(model.amount_cents),
            card_last4: model.card_last4,
            card_expiry: model.card_expiry,
            cheque_number: model.cheque_number,
            cheque_bank: model.cheque_bank,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub item_id: i32,
    pub line_number: i32,
    pub product_id: Option<i32>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            item_id: model.item_id,
            line_number: model.line_number,
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            unit_price: from_cents(model.unit_price_cents),
            line_total: from_cents(model.line_total_cents),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressResponse {
    pub address_id: i32,
    pub address_type: String,
    pub recipient: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub phone: Option<String>,
}

impl From<order_address::Model> for AddressResponse {
    fn from(model: order_address::Model) -> Self {
        Self {
            address_id: model.address_id,
            address_type: model.address_type,
            recipient: model.recipient,
            street: model.street,
            postal_code: model.postal_code,
            city: model.city,
            country: model.country,
            phone: model.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    pub note_id: i32,
    pub note_text: String,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<order_note::Model> for NoteResponse {
    fn from(model: order_note::Model) -> Self {
        Self {
            note_id: model.note_id,
            note_text: model.note_text,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

/// An order with every dependent row
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub created_by_name: Option<String>,
    pub payment: Option<PaymentResponse>,
    pub items: Vec<OrderItemResponse>,
    pub addresses: Vec<AddressResponse>,
    pub notes: Vec<NoteResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Item line with its amounts resolved to cents
#[derive(Debug, Clone, PartialEq)]
struct PreparedItem {
    line_number: i32,
    product_id: Option<i32>,
    product_name: String,
    quantity: i32,
    unit_price_cents: i64,
    line_total_cents: i64,
}

/// Amounts computed once, before any database work
#[derive(Debug, Clone, PartialEq)]
struct PreparedOrder {
    items: Vec<PreparedItem>,
    subtotal_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    payment_cents: i64,
}

impl PreparedOrder {
    fn from_request(request: &CreateOrderRequest) -> Result<Self, ServiceError> {
        let overflow = || ServiceError::ValidationError("Order amounts are out of range".into());

        let mut items = Vec::with_capacity(request.items.len());
        let mut subtotal_cents: i64 = 0;
        for (index, item) in request.items.iter().enumerate() {
            let unit_price_cents = to_cents(item.unit_price)?;
            let line_total_cents = unit_price_cents
                .checked_mul(i64::from(item.quantity))
                .ok_or_else(overflow)?;
            subtotal_cents = subtotal_cents
                .checked_add(line_total_cents)
                .ok_or_else(overflow)?;
            let position = i32::try_from(index + 1).map_err(|_| overflow())?;
            items.push(PreparedItem {
                line_number: item.line_number.unwrap_or(position),
                product_id: item.product_id,
                product_name: item.product_name.trim().to_string(),
                quantity: item.quantity,
                unit_price_cents,
                line_total_cents,
            });
        }

        let shipping_cents = request.shipping.map(to_cents).transpose()?.unwrap_or(0);
        let total_cents = match request.total {
            Some(total) => to_cents(total)?,
            None => subtotal_cents
                .checked_add(shipping_cents)
                .ok_or_else(overflow)?,
        };
        let payment_cents = request
            .payment
            .amount
            .map(to_cents)
            .transpose()?
            .unwrap_or(total_cents);

        Ok(Self {
            items,
            subtotal_cents,
            shipping_cents,
            total_cents,
            payment_cents,
        })
    }

    fn line_count(&self) -> i32 {
        i32::try_from(self.items.len()).unwrap_or(i32::MAX)
    }
}

/// Maps a database error, logging unique violations at warn level since they are retried.
fn db_failure(context: &'static str) -> impl Fn(DbErr) -> ServiceError {
    move |e| {
        if is_unique_violation(&e) || is_lock_contention(&e) {
            warn!(error = %e, "{}", context);
        } else {
            error!(error = %e, "{}", context);
        }
        ServiceError::DatabaseError(e)
    }
}

/// Service for managing orders and their dependent rows
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    retry: RetryConfig,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, retry: RetryConfig) -> Self {
        Self { db_pool, retry }
    }

    /// Creates an order with its payment, items, addresses and notes.
    ///
    /// Everything is written in one transaction. The transaction is replayed
    /// when the reference collides with a concurrent writer.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_order(
        &self,
        site_id: i32,
        created_by: Option<i32>,
        request: CreateOrderRequest,
    ) -> Result<OrderDetailResponse, ServiceError> {
        request.validate_all()?;
        let prepared = PreparedOrder::from_request(&request)?;
        self.check_references(site_id, &request).await?;

        let request = &request;
        let prepared = &prepared;
        let created = with_retry(&self.retry, &WriteConflictPolicy, move |attempt| {
            self.insert_order_graph(site_id, created_by, request, prepared, attempt)
        })
        .await
        .map_err(|e| {
            if e.is_write_conflict() {
                counter!("gespack_orders.create_conflicts", 1);
            }
            e
        })?;

        counter!("gespack_orders.created", 1);
        info!(
            order_id = created.order_id,
            order_reference = %created.order_reference,
            "Order created successfully"
        );

        self.get_order(&[site_id], created.order_id).await
    }

    /// Rejects customer and product ids that do not belong to the site
    async fn check_references(
        &self,
        site_id: i32,
        request: &CreateOrderRequest,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        if let Some(customer_id) = request.customer_id {
            let found = customer::Entity::find_by_id(customer_id)
                .filter(customer::Column::SiteId.eq(site_id))
                .count(db)
                .await?;
            if found == 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Customer {customer_id} does not exist on site {site_id}"
                )));
            }
        }

        let mut product_ids: Vec<i32> = request.items.iter().filter_map(|i| i.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        if !product_ids.is_empty() {
            let found = product::Entity::find()
                .filter(product::Column::SiteId.eq(site_id))
                .filter(product::Column::ProductId.is_in(product_ids.iter().copied()))
                .count(db)
                .await?;
            if found != product_ids.len() as u64 {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown product in order items for site {site_id}"
                )));
            }
        }

        Ok(())
    }

    /// One transactional attempt at writing the order graph
    async fn insert_order_graph(
        &self,
        site_id: i32,
        created_by: Option<i32>,
        request: &CreateOrderRequest,
        prepared: &PreparedOrder,
        attempt: u32,
    ) -> Result<order::Model, ServiceError> {
        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(db_failure("Failed to start transaction for order creation"))?;

        let order_reference = match request.supplied_reference() {
            Some(reference) => reference,
            None => next_order_reference(&txn, site_id)
                .await
                .map_err(db_failure("Failed to allocate order reference"))?,
        };
        debug!(attempt, order_reference = %order_reference, "Assembling order");

        let now = Utc::now();
        let mut created = order::ActiveModel {
            site_id: Set(site_id),
            order_reference: Set(order_reference),
            customer_id: Set(request.customer_id),
            brand_id: Set(request.brand_id),
            action_id: Set(request.action_id),
            payment_type_id: Set(Some(request.payment.payment_type_id)),
            payment_id: Set(None),
            order_datetime: Set(request.order_datetime.unwrap_or(now)),
            subtotal_cents: Set(prepared.subtotal_cents),
            shipping_cents: Set(prepared.shipping_cents),
            total_cents: Set(prepared.total_cents),
            order_lines: Set(prepared.line_count()),
            is_paid: Set(request.is_paid),
            is_invoiced: Set(request.is_invoiced),
            is_annulled: Set(false),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_failure("Failed to insert order"))?;

        let payment = order_payment::ActiveModel {
            site_id: Set(site_id),
            order_id: Set(created.order_id),
            payment_type_id: Set(request.payment.payment_type_id),
            amount_cents: Set(prepared.payment_cents),
            card_last4: Set(request.payment.card_last4.clone()),
            card_expiry: Set(request.payment.card_expiry.clone()),
            cheque_number: Set(request.payment.cheque_number.clone()),
            cheque_bank: Set(request.payment.cheque_bank.clone()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_failure("Failed to insert order payment"))?;

        order::Entity::update_many()
            .col_expr(order::Column::PaymentId, Expr::value(payment.payment_id))
            .filter(order::Column::OrderId.eq(created.order_id))
            .exec(&txn)
            .await
            .map_err(db_failure("Failed to link payment to order"))?;
        created.payment_id = Some(payment.payment_id);

        for item in &prepared.items {
            order_item::ActiveModel {
                site_id: Set(site_id),
                order_id: Set(created.order_id),
                line_number: Set(item.line_number),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                quantity: Set(item.quantity),
                unit_price_cents: Set(item.unit_price_cents),
                line_total_cents: Set(item.line_total_cents),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_failure("Failed to insert order item"))?;
        }

        for address in &request.addresses {
            order_address::ActiveModel {
                site_id: Set(site_id),
                order_id: Set(created.order_id),
                address_type: Set(address.address_type.clone()),
                recipient: Set(address.recipient.trim().to_string()),
                street: Set(address.street.trim().to_string()),
                postal_code: Set(address.postal_code.trim().to_string()),
                city: Set(address.city.trim().to_string()),
                country: Set(address.country.trim().to_string()),
                phone: Set(address.phone.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_failure("Failed to insert order address"))?;
        }

        for note in request.notes.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            order_note::ActiveModel {
                site_id: Set(site_id),
                order_id: Set(created.order_id),
                note_text: Set(note.to_string()),
                created_by: Set(created_by),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_failure("Failed to insert order note"))?;
        }

        txn.commit()
            .await
            .map_err(db_failure("Failed to commit order creation transaction"))?;

        Ok(created)
    }

    async fn find_scoped(&self, site_ids: &[i32], order_id: i32) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .filter(order::Column::SiteId.is_in(site_ids.iter().copied()))
            .one(&*self.db_pool)
            .await
            .map_err(db_failure("Failed to fetch order from database"))?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))
    }

    /// Retrieves an order with its dependent rows
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        site_ids: &[i32],
        order_id: i32,
    ) -> Result<OrderDetailResponse, ServiceError> {
        let db = &*self.db_pool;
        let found = self.find_scoped(site_ids, order_id).await?;

        let payment = match found.payment_id {
            Some(payment_id) => order_payment::Entity::find_by_id(payment_id).one(db).await?,
            None => {
                order_payment::Entity::find()
                    .filter(order_payment::Column::OrderId.eq(order_id))
                    .order_by_desc(order_payment::Column::PaymentId)
                    .one(db)
                    .await?
            }
        };

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::LineNumber)
            .order_by_asc(order_item::Column::ItemId)
            .all(db)
            .await?;

        let addresses = order_address::Entity::find()
            .filter(order_address::Column::OrderId.eq(order_id))
            .order_by_asc(order_address::Column::AddressId)
            .all(db)
            .await?;

        let notes = order_note::Entity::find()
            .filter(order_note::Column::OrderId.eq(order_id))
            .order_by_asc(order_note::Column::NoteId)
            .all(db)
            .await?;

        let created_by_name = match found.created_by {
            Some(user_id) => users::display_name(db, user_id).await?,
            None => None,
        };

        Ok(OrderDetailResponse {
            order: found.into(),
            created_by_name,
            payment: payment.map(Into::into),
            items: items.into_iter().map(Into::into).collect(),
            addresses: addresses.into_iter().map(Into::into).collect(),
            notes: notes.into_iter().map(Into::into).collect(),
        })
    }

    /// Lists orders newest first
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        site_ids: &[i32],
        filter: OrderListFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = order::Entity::find()
            .filter(order::Column::SiteId.is_in(site_ids.iter().copied()));

        if let Some(is_paid) = filter.is_paid {
            query = query.filter(order::Column::IsPaid.eq(is_paid));
        }
        if let Some(is_invoiced) = filter.is_invoiced {
            query = query.filter(order::Column::IsInvoiced.eq(is_invoiced));
        }
        if let Some(is_annulled) = filter.is_annulled {
            query = query.filter(order::Column::IsAnnulled.eq(is_annulled));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }

        let paginator = query
            .order_by_desc(order::Column::OrderDatetime)
            .order_by_desc(order::Column::OrderId)
            .paginate(&*self.db_pool, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(db_failure("Failed to count orders"))?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(db_failure("Failed to fetch orders page"))?;

        debug!(total, page, per_page, returned = orders.len(), "Orders listed");

        Ok(OrderListResponse {
            orders: orders.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Finds orders by reference prefix or customer name fragment
    #[instrument(skip(self))]
    pub async fn search_orders(
        &self,
        site_ids: &[i32],
        term: &str,
        limit: u64,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ServiceError::ValidationError(
                "Search term must not be empty".to_string(),
            ));
        }
        let db = &*self.db_pool;

        let customer_ids: Vec<i32> = customer::Entity::find()
            .select_only()
            .column(customer::Column::CustomerId)
            .filter(customer::Column::SiteId.is_in(site_ids.iter().copied()))
            .filter(
                Condition::any()
                    .add(customer::Column::FirstName.contains(term))
                    .add(customer::Column::LastName.contains(term)),
            )
            .into_tuple::<i32>()
            .all(db)
            .await?;

        let mut matches = Condition::any().add(order::Column::OrderReference.starts_with(term));
        if !customer_ids.is_empty() {
            matches = matches.add(order::Column::CustomerId.is_in(customer_ids));
        }

        let orders = order::Entity::find()
            .filter(order::Column::SiteId.is_in(site_ids.iter().copied()))
            .filter(matches)
            .order_by_desc(order::Column::OrderDatetime)
            .order_by_desc(order::Column::OrderId)
            .limit(limit)
            .all(db)
            .await?;

        Ok(orders.into_iter().map(Into::into).collect())
    }

    /// Applies a partial update to an order header
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        site_ids: &[i32],
        order_id: i32,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let existing = self.find_scoped(site_ids, order_id).await?;
        let subtotal_cents = existing.subtotal_cents;
        let mut shipping_cents = existing.shipping_cents;

        let mut active: order::ActiveModel = existing.into();
        if let Some(customer_id) = request.customer_id {
            active.customer_id = Set(Some(customer_id));
        }
        if let Some(brand_id) = request.brand_id {
            active.brand_id = Set(Some(brand_id));
        }
        if let Some(action_id) = request.action_id {
            active.action_id = Set(Some(action_id));
        }
        if let Some(payment_type_id) = request.payment_type_id {
            active.payment_type_id = Set(Some(payment_type_id));
        }
        if let Some(order_datetime) = request.order_datetime {
            active.order_datetime = Set(order_datetime);
        }
        if let Some(shipping) = request.shipping {
            shipping_cents = to_cents(shipping)?;
            active.shipping_cents = Set(shipping_cents);
        }
        match request.total {
            Some(total) => active.total_cents = Set(to_cents(total)?),
            None if request.shipping.is_some() => {
                let total = subtotal_cents.checked_add(shipping_cents).ok_or_else(|| {
                    ServiceError::ValidationError("Order amounts are out of range".into())
                })?;
                active.total_cents = Set(total);
            }
            None => {}
        }
        if let Some(is_paid) = request.is_paid {
            active.is_paid = Set(is_paid);
        }
        if let Some(is_invoiced) = request.is_invoiced {
            active.is_invoiced = Set(is_invoiced);
        }
        if let Some(is_annulled) = request.is_annulled {
            active.is_annulled = Set(is_annulled);
        }

        let updated = active
            .update(&*self.db_pool)
            .await
            .map_err(db_failure("Failed to update order"))?;

        info!(order_id, "Order updated");
        Ok(updated.into())
    }

    /// Appends a note to an existing order
    #[instrument(skip(self, request))]
    pub async fn add_note(
        &self,
        site_ids: &[i32],
        order_id: i32,
        created_by: Option<i32>,
        request: AddNoteRequest,
    ) -> Result<NoteResponse, ServiceError> {
        request.validate()?;
        let text = request.note_text.trim();
        if text.is_empty() {
            return Err(ServiceError::ValidationError(
                "Note text must not be blank".to_string(),
            ));
        }
        let existing = self.find_scoped(site_ids, order_id).await?;

        let note = order_note::ActiveModel {
            site_id: Set(existing.site_id),
            order_id: Set(existing.order_id),
            note_text: Set(text.to_string()),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(db_failure("Failed to insert order note"))?;

        Ok(note.into())
    }

    /// Deletes an order and all of its dependent rows atomically
    #[instrument(skip(self))]
    pub async fn delete_order(&self, site_ids: &[i32], order_id: i32) -> Result<(), ServiceError> {
        let existing = self.find_scoped(site_ids, order_id).await?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(db_failure("Failed to start transaction for order deletion"))?;

        order_note::Entity::delete_many()
            .filter(order_note::Column::OrderId.eq(existing.order_id))
            .exec(&txn)
            .await?;
        order_address::Entity::delete_many()
            .filter(order_address::Column::OrderId.eq(existing.order_id))
            .exec(&txn)
            .await?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(existing.order_id))
            .exec(&txn)
            .await?;
        order_payment::Entity::delete_many()
            .filter(order_payment::Column::OrderId.eq(existing.order_id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(existing.order_id)
            .exec(&txn)
            .await?;

        txn.commit()
            .await
            .map_err(db_failure("Failed to commit order deletion"))?;

        info!(order_id, "Order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::str::FromStr;

    fn item(name: &str, quantity: i32, price: &str) -> OrderItemRequest {
        OrderItemRequest {
            line_number: None,
            product_id: None,
            product_name: name.to_string(),
            quantity,
            unit_price: Decimal::from_str(price).unwrap(),
        }
    }

    fn request(items: Vec<OrderItemRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            order_reference: None,
            customer_id: None,
            brand_id: None,
            action_id: None,
            order_datetime: None,
            shipping: None,
            total: None,
            is_paid: false,
            is_invoiced: false,
            payment: PaymentRequest {
                payment_type_id: 1,
                amount: None,
                card_last4: None,
                card_expiry: None,
                cheque_number: None,
                cheque_bank: None,
            },
            items,
            addresses: vec![],
            notes: vec![],
        }
    }

    #[test]
    fn totals_default_to_subtotal_plus_shipping() {
        let mut req = request(vec![item("Box", 2, "10.50"), item("Tape", 3, "1.99")]);
        req.shipping = Some(Decimal::from_str("4.90").unwrap());

        let prepared = PreparedOrder::from_request(&req).unwrap();

        assert_eq!(prepared.subtotal_cents, 2100 + 597);
        assert_eq!(prepared.shipping_cents, 490);
        assert_eq!(prepared.total_cents, 2697 + 490);
        assert_eq!(prepared.payment_cents, prepared.total_cents);
        assert_eq!(prepared.line_count(), 2);
    }

    #[test]
    fn supplied_total_and_payment_amount_win() {
        let mut req = request(vec![item("Box", 1, "10")]);
        req.total = Some(Decimal::from(8));
        req.payment.amount = Some(Decimal::from(5));

        let prepared = PreparedOrder::from_request(&req).unwrap();

        assert_eq!(prepared.total_cents, 800);
        assert_eq!(prepared.payment_cents, 500);
    }

    #[test]
    fn line_numbers_default_to_position() {
        let mut second = item("Tape", 1, "1");
        second.line_number = Some(10);
        let req = request(vec![item("Box", 1, "1"), second, item("Bag", 1, "1")]);

        let prepared = PreparedOrder::from_request(&req).unwrap();
        let numbers: Vec<i32> = prepared.items.iter().map(|i| i.line_number).collect();

        assert_eq!(numbers, vec![1, 10, 3]);
    }

    #[test]
    fn blank_reference_means_allocate() {
        let mut req = request(vec![]);
        assert_eq!(req.supplied_reference(), None);
        req.order_reference = Some("   ".into());
        assert_eq!(req.supplied_reference(), None);
        req.order_reference = Some(" 00000042 ".into());
        assert_eq!(req.supplied_reference().as_deref(), Some("00000042"));
    }

    #[test]
    fn nested_validation_rejects_bad_lines() {
        let req = request(vec![item("Box", 0, "1")]);
        assert_matches!(req.validate_all(), Err(ServiceError::ValidationError(_)));

        let req = request(vec![item("Box", 1, "-1")]);
        assert_matches!(req.validate_all(), Err(ServiceError::ValidationError(_)));

        let mut req = request(vec![]);
        req.payment.payment_type_id = 0;
        assert_matches!(req.validate_all(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn address_type_must_be_known() {
        let mut req = request(vec![]);
        req.addresses.push(AddressRequest {
            address_type: "office".into(),
            recipient: "A".into(),
            street: "1 rue".into(),
            postal_code: "75001".into(),
            city: "Paris".into(),
            country: "France".into(),
            phone: None,
        });
        assert_matches!(req.validate_all(), Err(ServiceError::ValidationError(_)));

        req.addresses[0].address_type = order_address::SHIPPING.into();
        assert!(req.validate_all().is_ok());
    }
}
