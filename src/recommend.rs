use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::db::{call_blocking, CandidateProduct, Database, ShoppedItem};
use crate::error::GrocerError;
use crate::llm::CompletionProvider;

const MAX_RECOMMENDATIONS: usize = 4;
const PURCHASE_HISTORY_LIMIT: usize = 20;
const CANDIDATE_POOL_LIMIT: usize = 50;
const CANDIDATES_IN_PROMPT: usize = 30;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct RecommendationResult {
    pub recommendations: Vec<Recommendation>,
    pub response_time_ms: i64,
    pub recommendation_id: i64,
    pub saved_at: String,
}

pub struct Recommender {
    db: Arc<Database>,
    llm: Arc<dyn CompletionProvider>,
}

impl Recommender {
    pub fn new(db: Arc<Database>, llm: Arc<dyn CompletionProvider>) -> Self {
        Recommender { db, llm }
    }

    /// Pick 3-4 products the user might want next. The provider path asks
    /// for a strict machine-parseable format; any provider or parse failure
    /// falls back to a random sample of candidates, so this only errors on
    /// storage failures.
    pub async fn recommend(&self, user_id: i64) -> Result<RecommendationResult, GrocerError> {
        let started = Instant::now();

        let purchases = call_blocking(self.db.clone(), move |db| {
            db.recent_purchases(user_id, PURCHASE_HISTORY_LIMIT)
        })
        .await?;
        let cart = call_blocking(self.db.clone(), move |db| db.cart_contents(user_id)).await?;
        let candidates = call_blocking(self.db.clone(), move |db| {
            db.candidate_products(user_id, CANDIDATE_POOL_LIMIT)
        })
        .await?;

        let recommendations = if candidates.is_empty() {
            // Everything active is already bought or carted.
            Vec::new()
        } else {
            match self.provider_path(&purchases, &cart, &candidates).await {
                Ok(recs) => recs,
                Err(e) => {
                    warn!("recommendation provider path failed, using fallback: {e}");
                    self.fallback(user_id).await?
                }
            }
        };

        let recommendations_json = serde_json::to_string(&recommendations)?;
        let (recommendation_id, saved_at) = call_blocking(self.db.clone(), move |db| {
            db.save_recommendation(user_id, &recommendations_json)
        })
        .await?;

        Ok(RecommendationResult {
            recommendations,
            response_time_ms: started.elapsed().as_millis() as i64,
            recommendation_id,
            saved_at,
        })
    }

    async fn provider_path(
        &self,
        purchases: &[ShoppedItem],
        cart: &[ShoppedItem],
        candidates: &[CandidateProduct],
    ) -> Result<Vec<Recommendation>, GrocerError> {
        let prompt = build_prompt(purchases, cart, candidates);
        let raw = self.llm.complete(&prompt).await?;
        parse_recommendations(&raw)
    }

    async fn fallback(&self, user_id: i64) -> Result<Vec<Recommendation>, GrocerError> {
        let sample = call_blocking(self.db.clone(), move |db| {
            db.random_candidates(user_id, MAX_RECOMMENDATIONS)
        })
        .await?;
        Ok(sample
            .into_iter()
            .map(|p| Recommendation {
                reason: format!(
                    "Popular {} item you might enjoy",
                    p.category_name.as_deref().unwrap_or("grocery")
                ),
                name: p.name,
            })
            .collect())
    }
}

fn describe_items(items: &[ShoppedItem], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .map(|item| {
            format!(
                "{} ({}, qty: {})",
                item.name,
                item.category_name.as_deref().unwrap_or("uncategorized"),
                item.quantity
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_prompt(
    purchases: &[ShoppedItem],
    cart: &[ShoppedItem],
    candidates: &[CandidateProduct],
) -> String {
    let available = candidates
        .iter()
        .take(CANDIDATES_IN_PROMPT)
        .map(|p| {
            format!(
                "{} ({})",
                p.name,
                p.category_name.as_deref().unwrap_or("uncategorized")
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an AI shopping assistant for GrocerAI. Based on the user's shopping data, recommend 3-4 products they might want to buy.

User's Recent Purchase History: {}

Current Cart Items: {}

Available Products to Choose From: {}

Please recommend 3-4 products from the available list that would complement their shopping pattern. Consider:
- Items that pair well with their recent purchases
- Products that complete meals or recipes
- Seasonal or complementary items
- Different categories for variety

Respond ONLY with a JSON array in this exact format (no other text):
[
  {{"name": "Product Name", "reason": "Brief reason why this product fits their shopping pattern"}},
  {{"name": "Product Name", "reason": "Brief reason why this product fits their shopping pattern"}}
]

Make sure product names exactly match those from the available products list."#,
        describe_items(purchases, "No purchase history"),
        describe_items(cart, "Empty cart"),
        available,
    )
}

/// Strict structural validation of the provider's output: a non-empty JSON
/// array of objects with non-empty `name` and `reason`, truncated to at
/// most four entries. Code fences are stripped first since models like to
/// wrap JSON in them.
fn parse_recommendations(raw: &str) -> Result<Vec<Recommendation>, GrocerError> {
    let cleaned = strip_code_fences(raw);
    let values: Vec<serde_json::Value> = serde_json::from_str(&cleaned)
        .map_err(|e| GrocerError::Parse(format!("not a JSON array: {e}")))?;

    let recommendations: Vec<Recommendation> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Recommendation>(v).ok())
        .filter(|r| !r.name.trim().is_empty() && !r.reason.trim().is_empty())
        .take(MAX_RECOMMENDATIONS)
        .collect();

    if recommendations.is_empty() {
        return Err(GrocerError::Parse(
            "no well-formed recommendation entries".into(),
        ));
    }
    Ok(recommendations)
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use async_trait::async_trait;

    struct FixedProvider {
        reply: String,
    }

    #[async_trait]
    impl CompletionProvider for FixedProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, GrocerError> {
            Ok(self.reply.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CompletionProvider for FailingProvider {
        async fn complete(&self, _prompt: &str) -> Result<String, GrocerError> {
            Err(GrocerError::ProviderQuota)
        }
    }

    fn test_db() -> (Arc<Database>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("grocerai_rec_test_{}", uuid::Uuid::new_v4()));
        let db = Arc::new(Database::new(dir.to_str().unwrap()).unwrap());
        (db, dir)
    }

    fn cleanup(dir: &std::path::Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    fn seed_catalog(db: &Database) {
        let cat = db.insert_category("Produce").unwrap();
        for name in ["Apples", "Bananas", "Carrots", "Dates", "Endive", "Figs"] {
            db.insert_product(name, None, Some(cat)).unwrap();
        }
    }

    #[test]
    fn test_parse_valid_array() {
        let raw = r#"[{"name":"Apples","reason":"Pairs with your oats"},{"name":"Figs","reason":"In season"}]"#;
        let recs = parse_recommendations(raw).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].name, "Apples");
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let raw = "```json\n[{\"name\":\"Apples\",\"reason\":\"Good\"}]\n```";
        let recs = parse_recommendations(raw).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn test_parse_rejects_non_json_and_empty() {
        assert!(matches!(
            parse_recommendations("I suggest apples!"),
            Err(GrocerError::Parse(_))
        ));
        assert!(matches!(
            parse_recommendations("[]"),
            Err(GrocerError::Parse(_))
        ));
        // Entries without both fields are dropped; all-dropped is an error.
        assert!(parse_recommendations(r#"[{"name":"x"},{"reason":"y"}]"#).is_err());
        assert!(parse_recommendations(r#"[{"name":"  ","reason":"y"}]"#).is_err());
    }

    #[test]
    fn test_parse_truncates_to_four() {
        let raw = r#"[
            {"name":"a","reason":"r"},{"name":"b","reason":"r"},
            {"name":"c","reason":"r"},{"name":"d","reason":"r"},
            {"name":"e","reason":"r"}
        ]"#;
        let recs = parse_recommendations(raw).unwrap();
        assert_eq!(recs.len(), 4);
    }

    #[test]
    fn test_build_prompt_mentions_shopping_data() {
        let purchases = vec![ShoppedItem {
            name: "Milk".into(),
            category_name: Some("Dairy".into()),
            quantity: 2,
        }];
        let candidates = vec![CandidateProduct {
            name: "Eggs".into(),
            description: None,
            category_name: Some("Dairy".into()),
        }];
        let prompt = build_prompt(&purchases, &[], &candidates);
        assert!(prompt.contains("Milk (Dairy, qty: 2)"));
        assert!(prompt.contains("Empty cart"));
        assert!(prompt.contains("Eggs (Dairy)"));
        assert!(prompt.contains("Respond ONLY with a JSON array"));
    }

    #[tokio::test]
    async fn test_recommend_provider_path() {
        let (db, dir) = test_db();
        seed_catalog(&db);
        let provider = Arc::new(FixedProvider {
            reply: r#"[{"name":"Apples","reason":"You seem to like fruit"}]"#.into(),
        });
        let recommender = Recommender::new(db, provider);

        let result = recommender.recommend(1).await.unwrap();
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].name, "Apples");
        assert!(result.recommendation_id > 0);
        assert!(!result.saved_at.is_empty());
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_recommend_falls_back_on_malformed_output() {
        let (db, dir) = test_db();
        seed_catalog(&db);
        let provider = Arc::new(FixedProvider {
            reply: "sorry, I can only answer in prose".into(),
        });
        let recommender = Recommender::new(db, provider);

        let result = recommender.recommend(1).await.unwrap();
        assert!(!result.recommendations.is_empty());
        assert!(result.recommendations.len() <= MAX_RECOMMENDATIONS);
        for rec in &result.recommendations {
            assert!(rec.reason.contains("Produce"));
        }
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_recommend_falls_back_on_provider_error() {
        let (db, dir) = test_db();
        seed_catalog(&db);
        let recommender = Recommender::new(db, Arc::new(FailingProvider));

        let result = recommender.recommend(1).await.unwrap();
        assert_eq!(result.recommendations.len(), MAX_RECOMMENDATIONS);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn test_recommend_with_empty_catalog() {
        let (db, dir) = test_db();
        let recommender = Recommender::new(db, Arc::new(FailingProvider));

        let result = recommender.recommend(1).await.unwrap();
        assert!(result.recommendations.is_empty());
        assert!(result.recommendation_id > 0);
        cleanup(&dir);
    }
}
