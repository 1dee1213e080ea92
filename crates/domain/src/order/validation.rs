//! Structural checks on order commands.

use common::Money;
use storage::{NewOrderLine, OrderKind};

use super::commands::{CustomerDetails, LineRequest, PlaceOrder, UpdateOrder};
use crate::error::ValidationErrors;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn require_text(errors: &mut ValidationErrors, field: &str, value: &str) {
    if is_blank(value) {
        errors.add(field, "is required");
    }
}

fn require_non_negative(errors: &mut ValidationErrors, field: &str, value: Money) {
    if value.is_negative() {
        errors.add(field, "must not be negative");
    }
}

/// Validates a placement command and converts its lines into storable form.
///
/// Every problem is reported, not only the first.
pub fn validate_placement(cmd: &PlaceOrder) -> Result<Vec<NewOrderLine>, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    require_non_negative(&mut errors, "price", cmd.price);
    require_non_negative(&mut errors, "bonus", cmd.bonus);
    require_text(&mut errors, "status", &cmd.status);
    require_text(&mut errors, "service_mode", &cmd.service_mode);

    match &cmd.customer {
        CustomerDetails::Individual { phone, name } => {
            require_text(&mut errors, "phone", phone);
            require_text(&mut errors, "name", name);
        }
        CustomerDetails::Legal {
            organization,
            tax_id,
        } => {
            require_text(&mut errors, "organization", organization);
            require_text(&mut errors, "tax_id", tax_id);
        }
    }

    if cmd.lines.is_empty() {
        errors.add("lines", "must contain at least one line");
    }

    let lines: Vec<NewOrderLine> = cmd
        .lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| validate_line(&mut errors, i, line))
        .collect();

    errors.into_result().map(|()| lines)
}

fn validate_line(
    errors: &mut ValidationErrors,
    index: usize,
    line: &LineRequest,
) -> Option<NewOrderLine> {
    let mut valid = true;

    if line.product_id.as_i64() <= 0 {
        errors.add(format!("lines[{index}].product_id"), "must be positive");
        valid = false;
    }

    let quantity = if line.quantity < 1 {
        errors.add(format!("lines[{index}].quantity"), "must be at least 1");
        None
    } else {
        let parsed = u32::try_from(line.quantity).ok();
        if parsed.is_none() {
            errors.add(format!("lines[{index}].quantity"), "is too large");
        }
        parsed
    };

    match quantity {
        Some(quantity) if valid => Some(NewOrderLine {
            product_id: line.product_id,
            quantity,
        }),
        _ => None,
    }
}

/// Validates the fields an update supplies for an order of `kind`.
///
/// Absent fields are always fine, and so are fields of the other kind since
/// the update ignores them. A supplied comment may be empty, which clears it.
pub fn validate_update(cmd: &UpdateOrder, kind: OrderKind) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Some(price) = cmd.price {
        require_non_negative(&mut errors, "price", price);
    }
    if let Some(bonus) = cmd.bonus {
        require_non_negative(&mut errors, "bonus", bonus);
    }

    let kind_fields = match kind {
        OrderKind::Individual => [("phone", &cmd.phone), ("name", &cmd.name)],
        OrderKind::Legal => [
            ("organization", &cmd.organization),
            ("tax_id", &cmd.tax_id),
        ],
    };

    for (field, value) in std::iter::once(("status", &cmd.status)).chain(kind_fields) {
        if let Some(value) = value {
            require_text(&mut errors, field, value);
        }
    }

    errors.into_result()
}
