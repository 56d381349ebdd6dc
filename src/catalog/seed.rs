//! Bootstrap sample catalog
//!
//! Installed on first open when the durable namespace is empty. Seed images
//! are external URLs only, so the initial catalog costs almost nothing
//! against the quota.

use crate::models::{BikeCategory, CatalogItem, Condition, ImageRef, ItemDraft};

pub fn sample_items() -> Vec<CatalogItem> {
    let drafts = vec![
        (
            ItemDraft {
                brand: "Honda".to_string(),
                model: "CB650R".to_string(),
                year: 2023,
                price: 9399.0,
                category: BikeCategory::Naked,
                condition: Condition::New,
                mileage: 0,
                description: "Neo-sports café with the 649cc inline four.".to_string(),
                features: vec![
                    "ABS".to_string(),
                    "LED lighting".to_string(),
                    "Assist/slipper clutch".to_string(),
                ],
                featured: true,
            },
            "https://images.example.com/stock/honda-cb650r.jpg",
        ),
        (
            ItemDraft {
                brand: "Yamaha".to_string(),
                model: "MT-07".to_string(),
                year: 2022,
                price: 6899.0,
                category: BikeCategory::Naked,
                condition: Condition::Used,
                mileage: 4200,
                description: "CP2 twin, one owner, full service history.".to_string(),
                features: vec!["ABS".to_string(), "Tail tidy".to_string()],
                featured: true,
            },
            "https://images.example.com/stock/yamaha-mt07.jpg",
        ),
        (
            ItemDraft {
                brand: "Kawasaki".to_string(),
                model: "Versys 650".to_string(),
                year: 2021,
                price: 6250.0,
                category: BikeCategory::Adventure,
                condition: Condition::Used,
                mileage: 15800,
                description: "Commuter-tourer with panniers and heated grips.".to_string(),
                features: vec![
                    "Panniers".to_string(),
                    "Heated grips".to_string(),
                    "Adjustable screen".to_string(),
                ],
                featured: false,
            },
            "https://images.example.com/stock/kawasaki-versys650.jpg",
        ),
        (
            ItemDraft {
                brand: "Harley-Davidson".to_string(),
                model: "Iron 883".to_string(),
                year: 2019,
                price: 7990.0,
                category: BikeCategory::Cruiser,
                condition: Condition::Used,
                mileage: 9600,
                description: "Blacked-out Sportster, stage one exhaust.".to_string(),
                features: vec!["Stage 1 exhaust".to_string(), "Solo seat".to_string()],
                featured: false,
            },
            "https://images.example.com/stock/hd-iron883.jpg",
        ),
    ];

    drafts
        .into_iter()
        .map(|(draft, url)| {
            let mut item = CatalogItem::from_draft(draft);
            item.images.push(ImageRef::External {
                url: url.to_string(),
            });
            item
        })
        .collect()
}

pub fn sample_cover_photos() -> Vec<ImageRef> {
    [
        "https://images.example.com/hero/showroom-front.jpg",
        "https://images.example.com/hero/track-day.jpg",
        "https://images.example.com/hero/touring-sunset.jpg",
    ]
    .into_iter()
    .map(|url| ImageRef::External {
        url: url.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_items_carry_no_embedded_payloads() {
        for item in sample_items() {
            assert!(!item.images.is_empty());
            assert!(item.images.iter().all(|i| !i.is_embedded()));
        }
    }

    #[test]
    fn test_seed_has_featured_items_for_the_storefront() {
        assert!(sample_items().iter().any(|item| item.featured));
    }
}
