use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::KeyValueStore;

const CART_STORAGE_KEY: &str = "zeroshift_cart";

/// Structured line identity: the same product in a different size or color
/// is a distinct line. A composite struct rather than a formatted string,
/// so separator characters in size/color can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: String,
    pub size: String,
    pub color: String,
    pub quantity: i32,
}

impl CartLine {
    pub fn key(&self) -> CartKey {
        CartKey {
            product_id: self.product_id,
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }
}

/// The shopping cart, mirrored to durable storage on every mutation and
/// rehydrated on boot. A corrupt payload starts the cart empty rather than
/// failing the boot.
pub struct Cart<S: KeyValueStore> {
    store: S,
    lines: Vec<CartLine>,
    is_open: bool,
}

impl<S: KeyValueStore> Cart<S> {
    pub fn load(store: S) -> Self {
        let lines = store
            .get(CART_STORAGE_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            store,
            lines,
            is_open: false,
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn set_open(&mut self, open: bool) {
        self.is_open = open;
    }

    pub fn total(&self) -> i64 {
        self.lines
            .iter()
            .map(|line| line.price * i64::from(line.quantity))
            .sum()
    }

    /// Merge into an existing line when the (product, size, color) identity
    /// matches, append otherwise. A successful add opens the cart panel.
    pub fn add_item(&mut self, item: CartLine) {
        let key = item.key();
        match self.lines.iter_mut().find(|line| line.key() == key) {
            Some(existing) => existing.quantity += item.quantity,
            None => self.lines.push(item),
        }
        self.is_open = true;
        self.persist();
    }

    /// Adjust a line's quantity by a delta, never dropping below 1.
    pub fn update_quantity(&mut self, key: &CartKey, delta: i32) {
        if let Some(line) = self.lines.iter_mut().find(|line| line.key() == *key) {
            line.quantity = (line.quantity + delta).max(1);
            self.persist();
        }
    }

    pub fn remove_item(&mut self, key: &CartKey) {
        self.lines.retain(|line| line.key() != *key);
        self.persist();
    }

    /// Wipe all lines; invoked after a successful checkout.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.persist();
    }

    fn persist(&self) {
        if let Ok(raw) = serde_json::to_string(&self.lines) {
            self.store.set(CART_STORAGE_KEY, &raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryStore;

    fn line(product_id: Uuid, size: &str, color: &str, quantity: i32) -> CartLine {
        CartLine {
            product_id,
            name: "Oversized Tee".into(),
            price: 10_000,
            image: String::new(),
            size: size.into(),
            color: color.into(),
            quantity,
        }
    }

    #[test]
    fn identical_identity_merges_quantities() {
        let mut cart = Cart::load(MemoryStore::new());
        let id = Uuid::new_v4();
        cart.add_item(line(id, "M", "Black", 1));
        cart.add_item(line(id, "M", "Black", 2));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn different_size_or_color_is_a_distinct_line() {
        let mut cart = Cart::load(MemoryStore::new());
        let id = Uuid::new_v4();
        cart.add_item(line(id, "M", "Black", 1));
        cart.add_item(line(id, "L", "Black", 1));
        cart.add_item(line(id, "M", "White", 1));
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn add_opens_the_cart_panel() {
        let mut cart = Cart::load(MemoryStore::new());
        assert!(!cart.is_open());
        cart.add_item(line(Uuid::new_v4(), "M", "Black", 1));
        assert!(cart.is_open());
    }

    #[test]
    fn quantity_never_drops_below_one() {
        let mut cart = Cart::load(MemoryStore::new());
        let item = line(Uuid::new_v4(), "M", "Black", 3);
        let key = item.key();
        cart.add_item(item);
        cart.update_quantity(&key, -100);
        assert_eq!(cart.lines()[0].quantity, 1);
        cart.update_quantity(&key, 2);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn remove_and_clear() {
        let mut cart = Cart::load(MemoryStore::new());
        let a = line(Uuid::new_v4(), "M", "Black", 1);
        let b = line(Uuid::new_v4(), "S", "Red", 1);
        let key_a = a.key();
        cart.add_item(a);
        cart.add_item(b);
        cart.remove_item(&key_a);
        assert_eq!(cart.lines().len(), 1);
        cart.clear();
        assert!(cart.lines().is_empty());
    }

    #[test]
    fn cart_survives_reload_through_storage() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        {
            let mut cart = Cart::load(store.clone());
            cart.add_item(line(id, "M", "Black", 2));
        }
        let cart = Cart::load(store);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.lines()[0].product_id, id);
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let store = MemoryStore::new();
        store.set("zeroshift_cart", "not json");
        let cart = Cart::load(store);
        assert!(cart.lines().is_empty());
    }

    #[test]
    fn total_sums_price_times_quantity() {
        let mut cart = Cart::load(MemoryStore::new());
        let mut a = line(Uuid::new_v4(), "M", "Black", 2);
        a.price = 10_000;
        let mut b = line(Uuid::new_v4(), "S", "Red", 1);
        b.price = 5_000;
        cart.add_item(a);
        cart.add_item(b);
        assert_eq!(cart.total(), 25_000);
    }
}
