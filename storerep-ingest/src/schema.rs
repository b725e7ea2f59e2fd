//! Canonical report record and per-field descriptor table
//!
//! Every canonical field is described once in [`FIELD_DESCRIPTORS`]. The
//! normalizer, the editor and the alias resolver all consult that table
//! instead of keeping their own field lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of canonical fields
pub const FIELD_COUNT: usize = 20;

/// Fallback for numeric fields when a value cannot be recovered
pub const NUMERIC_FALLBACK: f64 = 0.0;

/// Inclusive range every score field is clamped into
pub const SCORE_RANGE: (f64, f64) = (0.0, 100.0);

/// Canonical field of the store report
///
/// Declaration order matches [`FIELD_DESCRIPTORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    StoreName,
    OptimizationPercent,
    Widget1Name,
    Widget2Name,
    Widget3Name,
    RevenueCoverage,
    FunnelCoverage,
    WidgetUtilization,
    TotalRevenue,
    HomePageRevenue,
    CollectionPageRevenue,
    ProductPageRevenue,
    CartPageRevenue,
    CheckoutRevenue,
    PostPurchaseRevenue,
    Widget1Revenue,
    Widget2Revenue,
    Widget3Revenue,
    ProjectedMonthlyRevenue,
    ProjectedAnnualRevenue,
}

/// How a field's raw values are cleaned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, stripped of markup and control characters
    Text,
    /// Percentage-style number clamped to [`SCORE_RANGE`]
    Score,
    /// Unclamped number (currency amounts, projections)
    Number,
}

/// Static description of one canonical field
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub field: Field,
    /// JSON key (camelCase)
    pub key: &'static str,
    /// Human description used in the extraction prompt
    pub description: &'static str,
    pub kind: FieldKind,
    /// Substitute for empty text (text fields only)
    pub text_fallback: &'static str,
}

impl FieldDescriptor {
    pub fn is_numeric(&self) -> bool {
        !matches!(self.kind, FieldKind::Text)
    }

    /// Clamp bounds, present only for score fields
    pub fn clamp_range(&self) -> Option<(f64, f64)> {
        match self.kind {
            FieldKind::Score => Some(SCORE_RANGE),
            _ => None,
        }
    }
}

const fn text(field: Field, key: &'static str, description: &'static str, fallback: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        field,
        key,
        description,
        kind: FieldKind::Text,
        text_fallback: fallback,
    }
}

const fn numeric(field: Field, key: &'static str, description: &'static str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor {
        field,
        key,
        description,
        kind,
        text_fallback: "",
    }
}

/// Descriptor table, indexed by `Field as usize`
pub static FIELD_DESCRIPTORS: [FieldDescriptor; FIELD_COUNT] = [
    text(Field::StoreName, "storeName", "name of the store", "Unknown"),
    text(Field::OptimizationPercent, "optimizationPercent", "optimization percentage label, e.g. \"35%\"", ""),
    text(Field::Widget1Name, "widget1Name", "name of the first widget", ""),
    text(Field::Widget2Name, "widget2Name", "name of the second widget", ""),
    text(Field::Widget3Name, "widget3Name", "name of the third widget", ""),
    numeric(Field::RevenueCoverage, "revenueCoverage", "revenue coverage score", FieldKind::Score),
    numeric(Field::FunnelCoverage, "funnelCoverage", "funnel coverage score", FieldKind::Score),
    numeric(Field::WidgetUtilization, "widgetUtilization", "widget utilization score", FieldKind::Score),
    numeric(Field::TotalRevenue, "totalRevenue", "total store revenue", FieldKind::Number),
    numeric(Field::HomePageRevenue, "homePageRevenue", "revenue attributed to the home page", FieldKind::Number),
    numeric(Field::CollectionPageRevenue, "collectionPageRevenue", "revenue attributed to collection pages", FieldKind::Number),
    numeric(Field::ProductPageRevenue, "productPageRevenue", "revenue attributed to product pages", FieldKind::Number),
    numeric(Field::CartPageRevenue, "cartPageRevenue", "revenue attributed to the cart page", FieldKind::Number),
    numeric(Field::CheckoutRevenue, "checkoutRevenue", "revenue attributed to checkout", FieldKind::Number),
    numeric(Field::PostPurchaseRevenue, "postPurchaseRevenue", "revenue attributed to post-purchase pages", FieldKind::Number),
    numeric(Field::Widget1Revenue, "widget1Revenue", "revenue generated by the first widget", FieldKind::Number),
    numeric(Field::Widget2Revenue, "widget2Revenue", "revenue generated by the second widget", FieldKind::Number),
    numeric(Field::Widget3Revenue, "widget3Revenue", "revenue generated by the third widget", FieldKind::Number),
    numeric(Field::ProjectedMonthlyRevenue, "projectedMonthlyRevenue", "projected additional monthly revenue", FieldKind::Number),
    numeric(Field::ProjectedAnnualRevenue, "projectedAnnualRevenue", "projected additional annual revenue", FieldKind::Number),
];

impl Field {
    /// All canonical fields in declaration order
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::StoreName,
        Field::OptimizationPercent,
        Field::Widget1Name,
        Field::Widget2Name,
        Field::Widget3Name,
        Field::RevenueCoverage,
        Field::FunnelCoverage,
        Field::WidgetUtilization,
        Field::TotalRevenue,
        Field::HomePageRevenue,
        Field::CollectionPageRevenue,
        Field::ProductPageRevenue,
        Field::CartPageRevenue,
        Field::CheckoutRevenue,
        Field::PostPurchaseRevenue,
        Field::Widget1Revenue,
        Field::Widget2Revenue,
        Field::Widget3Revenue,
        Field::ProjectedMonthlyRevenue,
        Field::ProjectedAnnualRevenue,
    ];

    pub fn descriptor(self) -> &'static FieldDescriptor {
        &FIELD_DESCRIPTORS[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.descriptor().key
    }

    pub fn kind(self) -> FieldKind {
        self.descriptor().kind
    }

    /// Reverse lookup by exact JSON key
    pub fn from_key(key: &str) -> Option<Field> {
        FIELD_DESCRIPTORS
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::from_key(s).ok_or_else(|| format!("Unknown field: {}", s))
    }
}

/// Clean value of one field
///
/// Numeric fields normally hold `Number`; a numeric field may transiently hold
/// `Text("")` in the working record while a value is being edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Fully populated, schema-conformant report record
///
/// Produced only by [`crate::normalizer::materialize`]; consumed by the
/// report renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub store_name: String,
    pub optimization_percent: String,
    pub widget1_name: String,
    pub widget2_name: String,
    pub widget3_name: String,
    pub revenue_coverage: f64,
    pub funnel_coverage: f64,
    pub widget_utilization: f64,
    pub total_revenue: f64,
    pub home_page_revenue: f64,
    pub collection_page_revenue: f64,
    pub product_page_revenue: f64,
    pub cart_page_revenue: f64,
    pub checkout_revenue: f64,
    pub post_purchase_revenue: f64,
    pub widget1_revenue: f64,
    pub widget2_revenue: f64,
    pub widget3_revenue: f64,
    pub projected_monthly_revenue: f64,
    pub projected_annual_revenue: f64,
}

impl Default for CanonicalRecord {
    /// Illustrative record shown before any data has been entered
    fn default() -> Self {
        Self {
            store_name: "Sample Store".to_string(),
            optimization_percent: "35%".to_string(),
            widget1_name: "Recommended Products".to_string(),
            widget2_name: "Frequently Bought Together".to_string(),
            widget3_name: "Recently Viewed".to_string(),
            revenue_coverage: 68.0,
            funnel_coverage: 54.0,
            widget_utilization: 42.0,
            total_revenue: 250_000.0,
            home_page_revenue: 42_000.0,
            collection_page_revenue: 31_000.0,
            product_page_revenue: 87_000.0,
            cart_page_revenue: 23_000.0,
            checkout_revenue: 12_000.0,
            post_purchase_revenue: 9_000.0,
            widget1_revenue: 18_500.0,
            widget2_revenue: 12_400.0,
            widget3_revenue: 7_600.0,
            projected_monthly_revenue: 21_000.0,
            projected_annual_revenue: 252_000.0,
        }
    }
}

impl CanonicalRecord {
    fn text_slot(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::StoreName => Some(&mut self.store_name),
            Field::OptimizationPercent => Some(&mut self.optimization_percent),
            Field::Widget1Name => Some(&mut self.widget1_name),
            Field::Widget2Name => Some(&mut self.widget2_name),
            Field::Widget3Name => Some(&mut self.widget3_name),
            _ => None,
        }
    }

    fn number_slot(&mut self, field: Field) -> Option<&mut f64> {
        match field {
            Field::RevenueCoverage => Some(&mut self.revenue_coverage),
            Field::FunnelCoverage => Some(&mut self.funnel_coverage),
            Field::WidgetUtilization => Some(&mut self.widget_utilization),
            Field::TotalRevenue => Some(&mut self.total_revenue),
            Field::HomePageRevenue => Some(&mut self.home_page_revenue),
            Field::CollectionPageRevenue => Some(&mut self.collection_page_revenue),
            Field::ProductPageRevenue => Some(&mut self.product_page_revenue),
            Field::CartPageRevenue => Some(&mut self.cart_page_revenue),
            Field::CheckoutRevenue => Some(&mut self.checkout_revenue),
            Field::PostPurchaseRevenue => Some(&mut self.post_purchase_revenue),
            Field::Widget1Revenue => Some(&mut self.widget1_revenue),
            Field::Widget2Revenue => Some(&mut self.widget2_revenue),
            Field::Widget3Revenue => Some(&mut self.widget3_revenue),
            Field::ProjectedMonthlyRevenue => Some(&mut self.projected_monthly_revenue),
            Field::ProjectedAnnualRevenue => Some(&mut self.projected_annual_revenue),
            _ => None,
        }
    }

    /// Value of one field
    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::StoreName => self.store_name.as_str().into(),
            Field::OptimizationPercent => self.optimization_percent.as_str().into(),
            Field::Widget1Name => self.widget1_name.as_str().into(),
            Field::Widget2Name => self.widget2_name.as_str().into(),
            Field::Widget3Name => self.widget3_name.as_str().into(),
            Field::RevenueCoverage => self.revenue_coverage.into(),
            Field::FunnelCoverage => self.funnel_coverage.into(),
            Field::WidgetUtilization => self.widget_utilization.into(),
            Field::TotalRevenue => self.total_revenue.into(),
            Field::HomePageRevenue => self.home_page_revenue.into(),
            Field::CollectionPageRevenue => self.collection_page_revenue.into(),
            Field::ProductPageRevenue => self.product_page_revenue.into(),
            Field::CartPageRevenue => self.cart_page_revenue.into(),
            Field::CheckoutRevenue => self.checkout_revenue.into(),
            Field::PostPurchaseRevenue => self.post_purchase_revenue.into(),
            Field::Widget1Revenue => self.widget1_revenue.into(),
            Field::Widget2Revenue => self.widget2_revenue.into(),
            Field::Widget3Revenue => self.widget3_revenue.into(),
            Field::ProjectedMonthlyRevenue => self.projected_monthly_revenue.into(),
            Field::ProjectedAnnualRevenue => self.projected_annual_revenue.into(),
        }
    }

    /// Write an already-clean value into its slot
    ///
    /// Values of the wrong shape for the field are ignored; callers go
    /// through [`crate::normalizer::materialize`], which never produces them.
    pub(crate) fn set(&mut self, field: Field, value: FieldValue) {
        match value {
            FieldValue::Text(s) => {
                if let Some(slot) = self.text_slot(field) {
                    *slot = s;
                }
            }
            FieldValue::Number(n) => {
                if let Some(slot) = self.number_slot(field) {
                    *slot = n;
                }
            }
        }
    }
}
