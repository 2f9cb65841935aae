//! Recommendation Requester
//!
//! Builds the prompt contract, makes one schema-constrained call and, only when
//! that call fails or its output does not validate, one free-text fallback call
//! asking for raw JSON of the same shape.
//!
//! The outcome is a [`GenerationOutcome`]; the only error is both calls failing.

use crate::engine::dedup::CandidatePool;
use crate::types::{
    GenerationError, OutputSchema, RecommendError, RecommendRequest, Recommendation, Seed,
    TextGenerator,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// Contract requirements sent with both the structured and the fallback call
const CONTRACT: &str = "\
Never recommend a book identical to a reference book (same title or same ISBN). \
Prefer candidates related to more than one reference book; a candidate strongly tied to exactly one \
reference book and weakly to the rest should rank lower, but do not exclude it. \
Each reason must be 3-5 concrete sentences naming the intended audience, prerequisites, and the \
skills or outcomes the reader gains. \
Every recommendation must include relatedTo: the titles of the reference books it relates to most \
strongly, listing several whenever you can justify it.";

/// Typed result of the two-attempt generation chain
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// Structured call succeeded and validated
    Structured(Vec<Recommendation>),
    /// Structured call failed; fallback text parsed
    Fallback(Vec<Recommendation>),
    /// Structured call failed; fallback text was not parseable JSON
    Unparseable(String),
}

impl GenerationOutcome {
    /// Recommendations carried by the outcome (empty when unparseable)
    pub fn into_recommendations(self) -> Vec<Recommendation> {
        match self {
            GenerationOutcome::Structured(recs) | GenerationOutcome::Fallback(recs) => recs,
            GenerationOutcome::Unparseable(_) => Vec::new(),
        }
    }
}

pub struct RecommendationRequester<'a> {
    generator: &'a dyn TextGenerator,
    snippet_chars: usize,
}

impl<'a> RecommendationRequester<'a> {
    pub fn new(generator: &'a dyn TextGenerator, snippet_chars: usize) -> Self {
        Self {
            generator,
            snippet_chars,
        }
    }

    /// Ask the model to pick recommendations from `pool`
    ///
    /// # Errors
    /// `RecommendError::GenerationUnavailable` when the structured attempt failed and
    /// the fallback call itself failed. A fallback that returns unparseable text is
    /// not an error.
    pub async fn request(
        &self,
        seeds: &[Seed],
        pool: &CandidatePool,
        request: &RecommendRequest,
    ) -> Result<GenerationOutcome, RecommendError> {
        let seed_text = seed_block(seeds);
        let candidate_text = candidate_block(pool, self.snippet_chars);

        let structured_blocks = vec![
            format!(
                "You are a reading concierge. Using the reference books as clues to the reader's taste, \
                 recommend {} books from the candidate list. Difficulty: {}. Language: {}. {}",
                request.n, request.hardness, request.language, CONTRACT
            ),
            format!("[Reference books]\n{}", seed_text),
            format!("[Candidates]\n{}", candidate_text),
        ];

        let primary = match self
            .generator
            .generate_structured(&recommendation_schema(), &structured_blocks)
            .await
            .and_then(validate_structured)
        {
            Ok(recs) => {
                info!(count = recs.len(), "Structured generation succeeded");
                return Ok(GenerationOutcome::Structured(recs));
            }
            Err(e) => e,
        };

        warn!(error = %primary, "Structured generation failed, falling back to free text");

        let fallback_blocks = vec![
            format!(
                "Output JSON only. Keys: recommendations (Array<{{title, authors?, reason, confidence?, \
                 relatedTo?: string[]}}>). Recommend {} books. Language: {}. {}",
                request.n, request.language, CONTRACT
            ),
            format!("[Reference books]\n{}", seed_text),
            format!("[Candidates]\n{}", candidate_text),
        ];

        let text = match self.generator.generate_text(&fallback_blocks).await {
            Ok(text) => text,
            Err(fallback) => {
                return Err(RecommendError::GenerationUnavailable { primary, fallback });
            }
        };

        match parse_fallback(&text) {
            Ok(recs) => {
                info!(count = recs.len(), "Fallback generation parsed");
                Ok(GenerationOutcome::Fallback(recs))
            }
            Err(e) => {
                warn!(error = %e, "Fallback output is not parseable, returning no recommendations");
                Ok(GenerationOutcome::Unparseable(e.to_string()))
            }
        }
    }
}

/// Output schema for the structured call
///
/// Strict-mode schemas need every property listed as required, so optional fields
/// are expressed as nullable.
pub fn recommendation_schema() -> OutputSchema {
    OutputSchema {
        name: "recommendations".to_string(),
        schema: json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["recommendations"],
            "properties": {
                "recommendations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "required": ["title", "authors", "reason", "confidence", "relatedTo"],
                        "properties": {
                            "title": { "type": "string" },
                            "authors": { "type": ["array", "null"], "items": { "type": "string" } },
                            "reason": { "type": "string" },
                            "confidence": { "type": ["number", "null"] },
                            "relatedTo": { "type": "array", "items": { "type": "string" } }
                        }
                    }
                }
            }
        }),
    }
}

/// Validate a structured response against the recommendation contract
pub fn validate_structured(value: Value) -> Result<Vec<Recommendation>, GenerationError> {
    let list = value
        .get("recommendations")
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::Schema("missing recommendations array".to_string()))?;

    let mut recs = Vec::with_capacity(list.len());
    for (i, item) in list.iter().enumerate() {
        let rec: Recommendation = serde_json::from_value(item.clone())
            .map_err(|e| GenerationError::Schema(format!("recommendation {}: {}", i, e)))?;

        if rec.title.trim().is_empty() {
            return Err(GenerationError::Schema(format!("recommendation {}: empty title", i)));
        }
        if let Some(c) = rec.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(GenerationError::Schema(format!(
                    "recommendation {}: confidence {} outside [0, 1]",
                    i, c
                )));
            }
        }
        recs.push(strip_model_provenance(rec));
    }
    Ok(recs)
}

/// Parse free-text fallback output
///
/// Accepts an object with a `recommendations` array or a bare array, optionally
/// wrapped in a markdown code fence. Malformed entries are skipped and
/// confidences are clamped into [0, 1].
pub fn parse_fallback(text: &str) -> Result<Vec<Recommendation>, GenerationError> {
    let body = strip_code_fence(text);
    let value: Value =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    let list = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => match obj.get("recommendations") {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(GenerationError::Parse(
                    "object has no recommendations array".to_string(),
                ))
            }
        },
        _ => return Err(GenerationError::Parse("expected a JSON object or array".to_string())),
    };

    let recs = list
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Recommendation>(item).ok())
        .filter(|rec| !rec.title.trim().is_empty())
        .map(|mut rec| {
            rec.confidence = rec.confidence.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 1.0));
            strip_model_provenance(rec)
        })
        .collect();

    Ok(recs)
}

/// Provenance is only ever derived from a matched candidate, never taken from the model
fn strip_model_provenance(mut rec: Recommendation) -> Recommendation {
    rec.source = None;
    rec
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Flattened reference-book list for the prompt
pub fn seed_block(seeds: &[Seed]) -> String {
    if seeds.is_empty() {
        return "(empty)".to_string();
    }

    seeds
        .iter()
        .map(|s| {
            let mut line = format!("- {}", s.title().unwrap_or("(title?)"));
            if !s.authors.is_empty() {
                line.push_str(&format!(" / {}", s.authors.join(", ")));
            }
            if let Some(year) = s.year {
                line.push_str(&format!(" ({})", year));
            }
            if let Some(isbn) = s.isbn() {
                line.push_str(&format!(" [ISBN:{}]", isbn));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered candidate list for the prompt
pub fn candidate_block(pool: &CandidatePool, snippet_chars: usize) -> String {
    pool.iter()
        .enumerate()
        .map(|(i, c)| {
            let mut entry = format!("{}. {} / {}", i + 1, c.title, c.authors.join(", "));
            if let Some(year) = c.published_year {
                entry.push_str(&format!(" ({})", year));
            }
            entry.push('\n');
            if !c.description.is_empty() {
                let snippet: String = c.description.chars().take(snippet_chars).collect();
                entry.push_str(&format!("   {}…\n", snippet));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookSource, CatalogRecord};

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        let value = json!({ "recommendations": [
            { "title": "A", "reason": "r", "confidence": 1.4, "relatedTo": [] }
        ]});
        assert!(matches!(validate_structured(value), Err(GenerationError::Schema(_))));
    }

    #[test]
    fn test_validate_accepts_nullable_fields() {
        let value = json!({ "recommendations": [
            { "title": "A", "authors": null, "reason": "r", "confidence": null, "relatedTo": ["X"] }
        ]});
        let recs = validate_structured(value).unwrap();
        assert_eq!(recs.len(), 1);
        assert!(recs[0].authors.is_empty());
        assert_eq!(recs[0].related_to, vec!["X".to_string()]);
    }

    #[test]
    fn test_validate_requires_array() {
        assert!(validate_structured(json!({ "items": [] })).is_err());
    }

    #[test]
    fn test_fallback_tolerates_code_fence_and_clamps() {
        let text = "```json\n{\"recommendations\":[{\"title\":\"B\",\"reason\":\"r\",\"confidence\":3}]}\n```";
        let recs = parse_fallback(text).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].confidence, Some(1.0));
    }

    struct TextOnly(&'static str);

    #[async_trait::async_trait]
    impl TextGenerator for TextOnly {
        async fn generate_structured(
            &self,
            _schema: &OutputSchema,
            _blocks: &[String],
        ) -> Result<Value, GenerationError> {
            Err(GenerationError::EmptyResponse)
        }

        async fn generate_text(&self, _blocks: &[String]) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_fallback_without_recommendations_key_is_unparseable_outcome() {
        let generator = TextOnly(r#"{"books": [{"title": "B"}]}"#);
        let outcome = RecommendationRequester::new(&generator, 180)
            .request(&[], &CandidatePool::default(), &RecommendRequest::default())
            .await
            .unwrap();
        assert!(matches!(outcome, GenerationOutcome::Unparseable(_)));
    }

    #[test]
    fn test_fallback_object_without_recommendations_is_unparseable() {
        assert!(matches!(parse_fallback(r#"{"books": []}"#), Err(GenerationError::Parse(_))));
        assert!(parse_fallback(r#"{"recommendations": []}"#).unwrap().is_empty());
        assert_eq!(parse_fallback(r#"[{"title":"B","reason":"r"}]"#).unwrap().len(), 1);
    }

    #[test]
    fn test_fallback_skips_malformed_entries() {
        let text = r#"{"recommendations":[{"title":"B","reason":"r"},{"reason":"no title"},{"title":"","reason":"x"}]}"#;
        assert_eq!(parse_fallback(text).unwrap().len(), 1);
    }

    #[test]
    fn test_fallback_rejects_prose() {
        assert!(parse_fallback("Sorry, I cannot help with that.").is_err());
    }

    #[test]
    fn test_model_supplied_source_is_dropped() {
        let text = r#"[{"title":"B","reason":"r","source":{"api":"google","id":"x","info_url":"http://x"}}]"#;
        assert!(parse_fallback(text).unwrap()[0].source.is_none());
    }

    #[test]
    fn test_seed_block_format() {
        let seeds = vec![
            Seed {
                title: Some("Deep Learning".into()),
                authors: vec!["Ian Goodfellow".into(), "Yoshua Bengio".into()],
                year: Some(2016),
                ..Default::default()
            },
            Seed {
                isbn: Some("9784873117584".into()),
                ..Default::default()
            },
        ];
        assert_eq!(
            seed_block(&seeds),
            "- Deep Learning / Ian Goodfellow, Yoshua Bengio (2016)\n- (title?) [ISBN:9784873117584]"
        );
        assert_eq!(seed_block(&[]), "(empty)");
    }

    #[test]
    fn test_candidate_block_numbers_and_truncates() {
        let mut a = CatalogRecord::new("First", BookSource::Google);
        a.authors = vec!["X".into()];
        a.published_year = Some(2020);
        a.description = "abcdefghij".into();
        let b = CatalogRecord::new("Second", BookSource::OpenLibrary);
        let pool = CandidatePool::build(vec![a, b], 60);

        assert_eq!(
            candidate_block(&pool, 4),
            "1. First / X (2020)\n   abcd…\n\n2. Second / \n"
        );
    }
}
