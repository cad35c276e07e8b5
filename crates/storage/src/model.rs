//! Row types shared by every storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LocationId, OrderId, ProductId, UserId};

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Goods arriving at the warehouse; increases stock.
    Receiving,
    /// Goods leaving the warehouse; decreases stock.
    Shipping,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Receiving => "receiving",
            OrderType::Shipping => "shipping",
        }
    }

    /// Signed stock delta contributed by an order of this type.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            OrderType::Receiving => quantity,
            OrderType::Shipping => -quantity,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored order type is neither `receiving` nor `shipping`.
#[derive(Debug, Error)]
#[error("Unknown order type: {0}")]
pub struct UnknownOrderType(pub String);

impl std::str::FromStr for OrderType {
    type Err = UnknownOrderType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receiving" => Ok(OrderType::Receiving),
            "shipping" => Ok(OrderType::Shipping),
            other => Err(UnknownOrderType(other.to_string())),
        }
    }
}

/// An immutable entry in the order log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub product_id: ProductId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// An order about to be appended; the log assigns id and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub order_type: OrderType,
    pub product_id: ProductId,
    pub quantity: i64,
}

impl NewOrder {
    pub fn receiving(product_id: ProductId, quantity: i64) -> Self {
        Self {
            order_type: OrderType::Receiving,
            product_id,
            quantity,
        }
    }

    pub fn shipping(product_id: ProductId, quantity: i64) -> Self {
        Self {
            order_type: OrderType::Shipping,
            product_id,
            quantity,
        }
    }

    pub(crate) fn into_order(self) -> Order {
        Order {
            id: OrderId::new(),
            order_type: self.order_type,
            product_id: self.product_id,
            quantity: self.quantity,
            created_at: Utc::now(),
        }
    }
}

/// A catalog product with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub location_id: LocationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub quantity: i64,
    pub location_id: LocationId,
}

/// Catalog fields that may change after creation. Stock is not one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub sku: String,
    pub location_id: LocationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub capacity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub capacity: i64,
}

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Manages the catalog and accounts.
    Admin,
    /// Receives and ships goods.
    Staff,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored role is neither `admin` nor `staff`.
#[derive(Debug, Error)]
#[error("Unknown user role: {0}")]
pub struct UnknownUserRole(pub String);

impl std::str::FromStr for UserRole {
    type Err = UnknownUserRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "staff" => Ok(UserRole::Staff),
            other => Err(UnknownUserRole(other.to_string())),
        }
    }
}

/// A registered account. The password hash never leaves the process in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
}
