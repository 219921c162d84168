use super::super::domain::LineItem;

/// Order tags that opt an order out of returns, including localized storefront variants.
const NO_RETURN_TAGS: &[&str] = &[
    "final-sale",
    "no-returns",
    "no-return",
    "non-returnable",
    "venta-final",
    "sin-devolucion",
    "vente-finale",
    "non-retournable",
    "endverkauf",
    "kein-umtausch",
];

const FINAL_SALE_KEYS: &[&str] = &[
    "final-sale",
    "finalsale",
    "no-return",
    "no-returns",
    "non-returnable",
    "venta-final",
];

const PERSONALIZED_KEYS: &[&str] = &[
    "personalized",
    "personalised",
    "personalization",
    "personalisation",
    "customized",
    "customised",
    "custom",
    "custom-text",
    "engraving",
    "monogram",
];

const GIFT_KEYS: &[&str] = &["gift", "is-gift", "gift-item"];

const FALSY_VALUES: &[&str] = &["", "false", "no", "0", "off", "none"];

/// Item-level flag that blocks a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemMarker {
    FinalSale,
    Personalized,
    Gift,
}

/// Lowercase and fold `_`/space separators to `-` so `_final_sale` and `Final Sale` compare equal.
pub(crate) fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c.is_whitespace() { '-' } else { c })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

pub(crate) fn matching_no_return_tag<'a>(tags: &'a [String], extra: &[String]) -> Option<&'a str> {
    let extra: Vec<String> = extra.iter().map(|tag| normalize(tag)).collect();
    tags.iter()
        .find(|tag| {
            let normalized = normalize(tag);
            NO_RETURN_TAGS.contains(&normalized.as_str()) || extra.contains(&normalized)
        })
        .map(String::as_str)
}

fn is_truthy(value: &str) -> bool {
    !FALSY_VALUES.contains(&normalize(value).as_str())
}

fn has_marker(item: &LineItem, keys: &[&str]) -> bool {
    item.properties.iter().any(|property| {
        let name = normalize(&property.name);
        let value = normalize(&property.value);
        (keys.contains(&name.as_str()) && is_truthy(&property.value))
            || keys.contains(&value.as_str())
    })
}

/// Strongest blocking marker on the item, final sale first.
pub(crate) fn item_marker(item: &LineItem) -> Option<ItemMarker> {
    if has_marker(item, FINAL_SALE_KEYS) {
        Some(ItemMarker::FinalSale)
    } else if has_marker(item, PERSONALIZED_KEYS) {
        Some(ItemMarker::Personalized)
    } else if has_marker(item, GIFT_KEYS) {
        Some(ItemMarker::Gift)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::returns::domain::LineItemProperty;

    fn item_with(name: &str, value: &str) -> LineItem {
        LineItem {
            id: "li-1".to_string(),
            title: "Linen Shirt".to_string(),
            variant_id: None,
            variant_title: None,
            price: 40.0,
            quantity: 1,
            fulfillment_status: Some("fulfilled".to_string()),
            properties: vec![LineItemProperty {
                name: name.to_string(),
                value: value.to_string(),
            }],
        }
    }

    #[test]
    fn normalize_folds_separators_and_case() {
        assert_eq!(normalize("_final_sale"), "final-sale");
        assert_eq!(normalize(" Final Sale "), "final-sale");
        assert_eq!(normalize("NO-RETURNS"), "no-returns");
    }

    #[test]
    fn final_sale_synonyms_are_detected() {
        assert_eq!(item_marker(&item_with("_final_sale", "true")), Some(ItemMarker::FinalSale));
        assert_eq!(item_marker(&item_with("final_sale", "Yes")), Some(ItemMarker::FinalSale));
        assert_eq!(item_marker(&item_with("Sale Type", "Final Sale")), Some(ItemMarker::FinalSale));
        assert_eq!(item_marker(&item_with("final_sale", "false")), None);
    }

    #[test]
    fn personalization_text_counts_as_marker() {
        assert_eq!(item_marker(&item_with("Engraving", "J.R.")), Some(ItemMarker::Personalized));
        assert_eq!(item_marker(&item_with("_gift", "TRUE")), Some(ItemMarker::Gift));
        assert_eq!(item_marker(&item_with("Color", "Blue")), None);
    }

    #[test]
    fn tenant_tags_extend_default_markers() {
        let tags = vec!["VIP".to_string(), "Clearance".to_string()];
        assert_eq!(matching_no_return_tag(&tags, &[]), None);
        assert_eq!(
            matching_no_return_tag(&tags, &["clearance".to_string()]),
            Some("Clearance")
        );
        let localized = vec!["Venta Final".to_string()];
        assert_eq!(matching_no_return_tag(&localized, &[]), Some("Venta Final"));
    }
}
