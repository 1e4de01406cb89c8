use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A product in the catalogue.
///
/// Entries are loaded once from the document collection and never mutated.
/// Position `i` in the collection corresponds to vector `i` in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub text: String,
    pub metadata: ProductMetadata,
}

/// Structured product attributes.
///
/// The named fields are required and checked by [`ProductMetadata::validate`]
/// at load time. Any other attributes in the collection are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub product_name: String,
    pub brand_name: String,
    pub price_usd: f64,
    pub rating: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProductMetadata {
    pub fn validate(&self) -> Result<(), String> {
        if self.product_name.trim().is_empty() {
            return Err("product_name is empty".to_string());
        }
        if self.brand_name.trim().is_empty() {
            return Err("brand_name is empty".to_string());
        }
        if !self.price_usd.is_finite() || self.price_usd < 0.0 {
            return Err(format!("price_usd {} is not a valid price", self.price_usd));
        }
        if !self.rating.is_finite() || !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("rating {} is outside 0..=5", self.rating));
        }
        Ok(())
    }
}

impl fmt::Display for CatalogueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metadata;
        writeln!(f, "{}", self.text.trim())?;
        write!(
            f,
            "Name: {} | Brand: {} | Price: ${:.2} | Rating: {}/5",
            m.product_name, m.brand_name, m.price_usd, m.rating
        )
    }
}

/// A catalogue entry matched by a query.
///
/// `similarity_score` is derived from `distance` and lies in `(0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub rank: usize,
    pub entry: CatalogueEntry,
    pub distance: f32,
    pub similarity_score: f32,
}

/// The product fields shown alongside a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub rating: f64,
}

impl From<&Candidate> for ProductSummary {
    fn from(candidate: &Candidate) -> Self {
        let m = &candidate.entry.metadata;
        Self {
            name: m.product_name.clone(),
            brand: m.brand_name.clone(),
            price: m.price_usd,
            rating: m.rating,
        }
    }
}

/// What the pipeline returns for one query.
///
/// `retrieved_products` is `None` when nothing in the catalogue was similar
/// enough to ground an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_products: Option<Vec<ProductSummary>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ProductMetadata {
        ProductMetadata {
            product_name: "Lip Tint".to_string(),
            brand_name: "GlowCo".to_string(),
            price_usd: 18.0,
            rating: 4.5,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_metadata_extra_fields_retained() {
        let raw = r#"{"product_name":"Lip Tint","brand_name":"GlowCo","price_usd":18,"rating":4.5,"size":"0.2 oz"}"#;
        let parsed: ProductMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.price_usd, 18.0);
        assert_eq!(parsed.extra.get("size").and_then(|v| v.as_str()), Some("0.2 oz"));
    }

    #[test]
    fn test_metadata_missing_required_field_fails_to_parse() {
        let raw = r#"{"product_name":"Lip Tint","price_usd":18,"rating":4.5}"#;
        assert!(serde_json::from_str::<ProductMetadata>(raw).is_err());
    }

    #[test]
    fn test_metadata_validation() {
        assert!(metadata().validate().is_ok());

        let mut bad = metadata();
        bad.rating = 7.0;
        assert!(bad.validate().is_err());

        let mut bad = metadata();
        bad.price_usd = -1.0;
        assert!(bad.validate().is_err());

        let mut bad = metadata();
        bad.brand_name = " ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_pipeline_result_omits_absent_products() {
        let result = PipelineResult {
            query: "q".to_string(),
            response: "r".to_string(),
            retrieved_products: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("retrieved_products").is_none());
    }

    #[test]
    fn test_entry_display_includes_metadata() {
        let entry = CatalogueEntry {
            text: "A sheer, buildable tint.".to_string(),
            metadata: metadata(),
        };
        let rendered = entry.to_string();
        assert!(rendered.contains("A sheer, buildable tint."));
        assert!(rendered.contains("Price: $18.00"));
        assert!(rendered.contains("Brand: GlowCo"));
    }
}
