use serde::{Deserialize, Serialize};

/// Id the stub assigns to every created product. Nothing is stored, so it
/// never changes.
pub const NEXT_ID: u32 = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub image: String,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rate: f64,
    pub count: u32,
}

const MEN: &str = "men's clothing";
const WOMEN: &str = "women's clothing";
const JEWELERY: &str = "jewelery";
const ELECTRONICS: &str = "electronics";

// (title, price, category, rate, count)
const SEED: [(&str, f64, &str, f64, u32); 20] = [
    ("Canvas Laptop Backpack", 109.95, MEN, 3.9, 120),
    ("Slim Fit Crew T-Shirt", 22.3, MEN, 4.1, 259),
    ("Cotton Field Jacket", 55.99, MEN, 4.7, 500),
    ("Casual Slim Shirt", 15.99, MEN, 2.1, 430),
    ("Dragon Chain Bracelet", 695.0, JEWELERY, 4.6, 400),
    ("Solid Gold Petite Micropave", 168.0, JEWELERY, 3.9, 70),
    ("White Gold Plated Princess Ring", 9.99, JEWELERY, 3.0, 400),
    ("Rose Gold Tunnel Earrings", 10.99, JEWELERY, 1.9, 100),
    ("2TB Portable External Hard Drive", 64.0, ELECTRONICS, 3.3, 203),
    ("1TB Internal SATA SSD", 109.0, ELECTRONICS, 2.9, 470),
    ("256GB NVMe SSD", 109.0, ELECTRONICS, 4.8, 319),
    ("4TB Gaming Drive", 114.0, ELECTRONICS, 4.8, 400),
    ("21.5 inch Full HD Monitor", 599.0, ELECTRONICS, 2.9, 250),
    ("49 inch Curved Gaming Monitor", 999.99, ELECTRONICS, 2.2, 140),
    ("Snowboard Winter Jacket", 56.99, WOMEN, 2.6, 235),
    ("Faux Leather Moto Jacket", 29.95, WOMEN, 2.9, 340),
    ("Striped Rain Jacket", 39.99, WOMEN, 3.8, 679),
    ("Boat Neck Short Sleeve Top", 9.85, WOMEN, 4.7, 130),
    ("Moisture Wicking Short Sleeve Tee", 7.95, WOMEN, 4.5, 146),
    ("Casual Cotton Tee", 12.99, WOMEN, 3.6, 145),
];

/// The fixed catalog, ids 1 through 20.
pub fn seed() -> Vec<Product> {
    SEED.iter()
        .zip(1..)
        .map(|(&(title, price, category, rate, count), id)| Product {
            id,
            title: title.to_string(),
            price,
            description: format!("{title}, listed in {category}."),
            category: category.to_string(),
            image: format!("https://catalog.invalid/img/{id}.jpg"),
            rating: Rating { rate, count },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_sequential_ids_and_four_categories() {
        let products = seed();
        assert_eq!(products.len(), 20);
        assert!(products.iter().zip(1..).all(|(p, id)| p.id == id));

        let mut categories: Vec<&str> = products.iter().map(|p| p.category.as_str()).collect();
        categories.dedup();
        assert_eq!(categories, vec![MEN, JEWELERY, ELECTRONICS, WOMEN]);
        assert!(products.iter().all(|p| p.id < NEXT_ID));
    }
}
