use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        AdminOrderList, AdminOrderSummary, CreateOrderRequest, OrderList, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    mailer,
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus},
    response::ApiResponse,
    state::AppState,
};

/// Persist a submitted cart as one order. The header insert and every line
/// insert share a single transaction: either the whole order exists
/// afterwards or none of it does.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("No order items".into()));
    }

    // Totals come from the submitted line data; the catalog is not consulted
    // at order time. See DESIGN.md for the trust boundary.
    let total_amount: i64 = payload
        .items
        .iter()
        .map(|item| item.price * i64::from(item.qty))
        .sum();

    let shipping = payload.shipping_address;
    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id()),
        shipping_name: Set(shipping.name.unwrap_or_else(|| user.user.name.clone())),
        shipping_street: Set(shipping.street),
        shipping_city: Set(shipping.city),
        shipping_state: Set(shipping.state),
        shipping_zip: Set(shipping.zip),
        shipping_country: Set(shipping.country.unwrap_or_else(|| "India".into())),
        payment_method: Set(payload.payment_method.unwrap_or_else(|| "Card".into())),
        payment_status: Set("Pending".into()),
        status: Set(OrderStatus::Processing),
        total_amount: Set(total_amount),
        delivered_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(payload.items.len());
    for input in payload.items {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(input.product_id),
            name: Set(input.name),
            image: Set(input.image.unwrap_or_default()),
            price: Set(input.price),
            qty: Set(input.qty),
            size: Set(input.size.unwrap_or_default()),
            color: Set(input.color.unwrap_or_default()),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    txn.commit().await?;

    let order = order_from_entity(order);

    let to = user.user.email.clone();
    let mail = state.mailer.clone();
    let order_for_mail = order.clone();
    let items_for_mail = items.clone();
    mailer::dispatch(async move {
        mail.send_order_confirmation(&to, &order_for_mail, &items_for_mail)
            .await
    });

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems { order, items },
    ))
}

pub async fn get_my_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.id()))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    if !order_ids.is_empty() {
        for item in OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(order_ids))
            .all(&state.orm)
            .await?
        {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(order_item_from_entity(item));
        }
    }

    let items = orders
        .into_iter()
        .map(|model| {
            let items = items_by_order.remove(&model.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(model),
                items,
            }
        })
        .collect();

    Ok(ApiResponse::success("Ok", OrderList { items }))
}

pub async fn get_order_by_id(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".into())),
    };

    if order.user_id != user.id() && !user.is_admin() {
        return Err(AppError::Forbidden);
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;

    let rows = Orders::find()
        .find_also_related(Users)
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let items: Vec<AdminOrderSummary> = rows
        .into_iter()
        .map(|(order, owner)| AdminOrderSummary {
            order: order_from_entity(order),
            user_name: owner.as_ref().map(|u| u.name.clone()),
            user_email: owner.map(|u| u.email),
        })
        .collect();

    let count = items.len() as i64;
    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList { count, items },
    ))
}

pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".into())),
    };

    let next = payload.status;
    if !existing.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {}",
            existing.status, next
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next);
    if next == OrderStatus::Delivered {
        active.delivered_at = Set(Some(Utc::now().into()));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        shipping_name: model.shipping_name,
        shipping_street: model.shipping_street,
        shipping_city: model.shipping_city,
        shipping_state: model.shipping_state,
        shipping_zip: model.shipping_zip,
        shipping_country: model.shipping_country,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        status: model.status,
        total_amount: model.total_amount,
        delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        name: model.name,
        image: model.image,
        price: model.price,
        qty: model.qty,
        size: model.size,
        color: model.color,
    }
}
