//! Label → canonical field resolution
//!
//! Spreadsheet headers and model-returned keys arrive in arbitrary spelling
//! ("Post-Purchase Revenue", "post purchase rev", "POST_PURCHASE_REVENUE").
//! Both the stored synonyms and incoming labels are reduced to a normalized
//! key (lowercase alphanumerics only) and matched exactly. There is no fuzzy
//! or partial matching: an unknown key resolves to `None`.

use crate::schema::{Field, FIELD_DESCRIPTORS};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Synonyms per canonical field (the field's own JSON key is added implicitly)
pub static FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::StoreName, &["store", "store name", "shop", "shop name", "merchant", "merchant name", "brand"]),
    (Field::OptimizationPercent, &[
        "optimization", "optimization %", "optimization percent", "optimization percentage",
        "optimisation percent", "uplift", "uplift percent", "revenue uplift",
    ]),
    (Field::Widget1Name, &["widget 1", "widget 1 name", "widget one", "widget one name", "first widget", "widget name 1"]),
    (Field::Widget2Name, &["widget 2", "widget 2 name", "widget two", "widget two name", "second widget", "widget name 2"]),
    (Field::Widget3Name, &["widget 3", "widget 3 name", "widget three", "widget three name", "third widget", "widget name 3"]),
    (Field::RevenueCoverage, &["revenue coverage", "revenue coverage %", "revenue coverage score", "rev coverage"]),
    (Field::FunnelCoverage, &["funnel coverage", "funnel coverage %", "funnel coverage score", "funnel"]),
    (Field::WidgetUtilization, &[
        "widget utilization", "widget utilisation", "widget utilization %", "widget utilization score",
        "widget usage", "utilization",
    ]),
    (Field::TotalRevenue, &["total revenue", "revenue", "total sales", "sales", "gross revenue", "total rev", "gmv"]),
    (Field::HomePageRevenue, &["home page revenue", "home revenue", "home page", "homepage", "home page rev"]),
    (Field::CollectionPageRevenue, &[
        "collection page revenue", "collection revenue", "collections revenue", "collection page",
        "category page revenue", "category revenue",
    ]),
    (Field::ProductPageRevenue, &["product page revenue", "product revenue", "product page", "pdp revenue", "pdp"]),
    (Field::CartPageRevenue, &["cart page revenue", "cart revenue", "cart page", "cart", "basket revenue"]),
    (Field::CheckoutRevenue, &["checkout revenue", "checkout page revenue", "checkout page", "checkout"]),
    (Field::PostPurchaseRevenue, &[
        "post purchase revenue", "post-purchase revenue", "post purchase rev", "post purchase",
        "thank you page revenue", "order confirmation revenue", "upsell revenue",
    ]),
    (Field::Widget1Revenue, &["widget 1 revenue", "widget one revenue", "first widget revenue", "widget 1 rev"]),
    (Field::Widget2Revenue, &["widget 2 revenue", "widget two revenue", "second widget revenue", "widget 2 rev"]),
    (Field::Widget3Revenue, &["widget 3 revenue", "widget three revenue", "third widget revenue", "widget 3 rev"]),
    (Field::ProjectedMonthlyRevenue, &[
        "projected monthly revenue", "projected monthly", "monthly projection", "monthly revenue projection",
        "estimated monthly revenue", "est monthly revenue",
    ]),
    (Field::ProjectedAnnualRevenue, &[
        "projected annual revenue", "projected annual", "annual projection", "annual revenue projection",
        "projected yearly revenue", "yearly projection", "estimated annual revenue",
    ]),
];

/// Resolver built once for the lifetime of the process
static RESOLVER: Lazy<AliasResolver> = Lazy::new(AliasResolver::new);

/// Reduce a label to lowercase alphanumeric characters
pub fn normalize_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve a label using the process-wide resolver
pub fn resolve_label(label: &str) -> Option<Field> {
    RESOLVER.resolve(label)
}

/// Process-wide resolver
pub fn resolver() -> &'static AliasResolver {
    &RESOLVER
}

/// Synonyms declared for `field`
pub fn aliases_for(field: Field) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Lookup table from normalized key to canonical field
#[derive(Debug, Clone)]
pub struct AliasResolver {
    keys: HashMap<String, Field>,
}

impl Default for AliasResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasResolver {
    pub fn new() -> Self {
        let mut keys = HashMap::new();

        let own_names = FIELD_DESCRIPTORS.iter().map(|d| (d.field, d.key));
        let synonyms = FIELD_ALIASES
            .iter()
            .flat_map(|(field, aliases)| aliases.iter().map(move |alias| (*field, *alias)));

        for (field, label) in own_names.chain(synonyms) {
            let key = normalize_key(label);
            if key.is_empty() {
                continue;
            }
            match keys.get(&key) {
                Some(existing) if *existing != field => {
                    warn!(
                        alias = label,
                        kept = %existing,
                        ignored = %field,
                        "Alias normalizes to a key already owned by another field"
                    );
                }
                Some(_) => {}
                None => {
                    keys.insert(key, field);
                }
            }
        }

        debug!("Alias resolver built with {} normalized keys", keys.len());
        Self { keys }
    }

    /// Canonical field for `label`, or `None` when the normalized key is unknown
    pub fn resolve(&self, label: &str) -> Option<Field> {
        let key = normalize_key(label);
        if key.is_empty() {
            return None;
        }
        self.keys.get(&key).copied()
    }

    /// Number of distinct normalized keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
