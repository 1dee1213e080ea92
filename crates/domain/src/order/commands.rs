//! Order commands.

use common::{IdempotencyKey, Money, OrderId, ProductId, UserId};
use storage::OrderKind;

/// Contact details, which also decide the order kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerDetails {
    Individual { phone: String, name: String },
    Legal { organization: String, tax_id: String },
}

impl CustomerDetails {
    pub fn individual(phone: impl Into<String>, name: impl Into<String>) -> Self {
        CustomerDetails::Individual {
            phone: phone.into(),
            name: name.into(),
        }
    }

    pub fn legal(organization: impl Into<String>, tax_id: impl Into<String>) -> Self {
        CustomerDetails::Legal {
            organization: organization.into(),
            tax_id: tax_id.into(),
        }
    }

    pub fn kind(&self) -> OrderKind {
        match self {
            CustomerDetails::Individual { .. } => OrderKind::Individual,
            CustomerDetails::Legal { .. } => OrderKind::Legal,
        }
    }
}

/// One requested `(product, quantity)` pair, exactly as the caller sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    /// Signed so that zero and negative requests reach validation.
    pub quantity: i64,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to place a new order against current stock.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    /// Caller-supplied order total. Persisted as given.
    pub price: Money,
    pub bonus: Money,
    pub user_id: Option<UserId>,
    pub status: String,
    pub service_mode: String,
    pub customer: CustomerDetails,
    pub comment: Option<String>,
    /// Processed in this order.
    pub lines: Vec<LineRequest>,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl PlaceOrder {
    /// Creates a placement with no bonus, no comment and no user.
    pub fn new(
        customer: CustomerDetails,
        price: Money,
        status: impl Into<String>,
        service_mode: impl Into<String>,
        lines: Vec<LineRequest>,
    ) -> Self {
        Self {
            price,
            bonus: Money::zero(),
            user_id: None,
            status: status.into(),
            service_mode: service_mode.into(),
            customer,
            comment: None,
            lines,
            idempotency_key: None,
        }
    }

    pub fn with_bonus(mut self, bonus: Money) -> Self {
        self.bonus = bonus;
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn kind(&self) -> OrderKind {
        self.customer.kind()
    }
}

/// Command to change header fields of an existing order.
///
/// `None` leaves a field untouched; `Some` overwrites it, including with zero.
/// A supplied empty comment clears the comment.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOrder {
    pub order_id: OrderId,
    pub price: Option<Money>,
    pub bonus: Option<Money>,
    pub status: Option<String>,
    /// Individual orders only.
    pub phone: Option<String>,
    /// Individual orders only.
    pub name: Option<String>,
    /// Legal orders only.
    pub organization: Option<String>,
    /// Legal orders only.
    pub tax_id: Option<String>,
    /// Legal orders only.
    pub comment: Option<String>,
}

impl UpdateOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            price: None,
            bonus: None,
            status: None,
            phone: None,
            name: None,
            organization: None,
            tax_id: None,
            comment: None,
        }
    }

    pub fn price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn bonus(mut self, bonus: Money) -> Self {
        self.bonus = Some(bonus);
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = Some(tax_id.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
