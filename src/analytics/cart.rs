use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::menu::{MenuItem, MenuItemId};
use crate::model::order::{CreateOrderLine, CreateOrderRequest};

const UNKNOWN_CUSTOMER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Point-of-sale cart: one line per menu item.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding an item already in the cart bumps its quantity.
    pub fn add(&mut self, item: &MenuItem) {
        match self.lines.iter_mut().find(|l| l.menu_item_id == item.id) {
            Some(line) => line.quantity += 1,
            None => self.lines.push(CartLine {
                menu_item_id: item.id,
                name: item.name.clone(),
                price: item.price,
                quantity: 1,
            }),
        }
    }

    /// Take one unit away, dropping the line once it reaches zero.
    pub fn remove(&mut self, id: MenuItemId) -> bool {
        let Some(pos) = self.lines.iter().position(|l| l.menu_item_id == id) else {
            return false;
        };
        if self.lines[pos].quantity <= 1 {
            self.lines.remove(pos);
        } else {
            self.lines[pos].quantity -= 1;
        }
        true
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Σ price × quantity, to the cent.
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum::<Decimal>().round_dp(2)
    }

    pub fn to_order_request(&self, customer_name: Option<&str>) -> CreateOrderRequest {
        let customer_name = customer_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_CUSTOMER);
        CreateOrderRequest {
            customer_name: Some(customer_name.to_string()),
            items: self
                .lines
                .iter()
                .map(|l| CreateOrderLine { menu_item_id: Some(l.menu_item_id), quantity: Some(l.quantity) })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(id: i64, name: &str, price: &str) -> MenuItem {
        MenuItem {
            id,
            name: name.to_string(),
            price: Decimal::from_str(price).unwrap(),
            category: "Main".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn same_item_twice_increments_quantity() {
        let burger = item(1, "Cheeseburger", "8.99");
        let mut cart = Cart::new();
        cart.add(&burger);
        cart.add(&burger);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.total(), Decimal::from_str("17.98").unwrap());
    }

    #[test]
    fn total_rounds_to_cents() {
        let mut cart = Cart::new();
        cart.add(&item(1, "Odd", "0.333"));
        cart.add(&item(1, "Odd", "0.333"));
        cart.add(&item(1, "Odd", "0.333"));
        cart.add(&item(2, "Soda", "1.99"));
        assert_eq!(cart.total(), Decimal::from_str("2.99").unwrap());
    }

    #[test]
    fn remove_decrements_then_drops() {
        let soda = item(6, "Soda", "1.99");
        let mut cart = Cart::new();
        cart.add(&soda);
        cart.add(&soda);
        assert!(cart.remove(6));
        assert_eq!(cart.lines()[0].quantity, 1);
        assert!(cart.remove(6));
        assert!(cart.is_empty());
        assert!(!cart.remove(6));
    }

    #[test]
    fn order_request_defaults_customer() {
        let mut cart = Cart::new();
        cart.add(&item(3, "Pasta", "10.99"));
        let request = cart.to_order_request(Some("  "));
        assert_eq!(request.customer_name.as_deref(), Some("Unknown"));
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].menu_item_id, Some(3));
        assert_eq!(request.items[0].quantity, Some(1));
    }
}
