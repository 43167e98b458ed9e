use index::Hit;
use intent::names;

/// Document types accepted as grounding for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRule {
    /// No grounding wanted at all.
    Nothing,
    /// Any document type.
    Any,
    /// Only documents whose `type` is one of these.
    OneOf(&'static [&'static str]),
}

const FAQ_ONLY: &[&str] = &["faq"];
const PRODUCT_ONLY: &[&str] = &["product"];
const PRODUCT_OR_FAQ: &[&str] = &["product", "faq"];

impl TypeRule {
    /// Rule applied for `intent`.
    pub fn for_intent(intent: &str) -> Self {
        if intent == names::SMALLTALK {
            TypeRule::Nothing
        } else if intent.starts_with(names::POLICY_PREFIX) {
            TypeRule::OneOf(FAQ_ONLY)
        } else if intent == names::PRODUCT_SEARCH || intent == names::PRODUCT_QA {
            TypeRule::OneOf(PRODUCT_ONLY)
        } else if intent == names::PROMO_PRICE {
            TypeRule::OneOf(PRODUCT_OR_FAQ)
        } else {
            TypeRule::Any
        }
    }

    pub fn accepts(&self, hit: &Hit) -> bool {
        match self {
            TypeRule::Nothing => false,
            TypeRule::Any => true,
            TypeRule::OneOf(kinds) => hit
                .document
                .metadata
                .doc_type()
                .is_some_and(|t| kinds.contains(&t)),
        }
    }
}

/// Narrow `raw_hits` to at most `top_k` hits whose type suits `intent`,
/// keeping their original order.
///
/// `smalltalk` always yields nothing. For every other intent, if the type
/// rule rejects every hit the first `top_k` raw hits are returned unfiltered,
/// so the result is only empty when `raw_hits` is.
pub fn filter_hits(raw_hits: &[Hit], intent: &str, top_k: usize) -> Vec<Hit> {
    let rule = TypeRule::for_intent(intent);
    if rule == TypeRule::Nothing || top_k == 0 {
        return Vec::new();
    }

    let filtered: Vec<Hit> = raw_hits
        .iter()
        .filter(|hit| rule.accepts(hit))
        .take(top_k)
        .cloned()
        .collect();

    if filtered.is_empty() {
        raw_hits.iter().take(top_k).cloned().collect()
    } else {
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::Document;
    use std::sync::Arc;

    fn hit(id: &str, kind: Option<&str>, score: f32) -> Hit {
        let mut doc = Document::new(id, format!("body of {id}"));
        if let Some(kind) = kind {
            doc = doc.with_type(kind);
        }
        Hit::new(Arc::new(doc), score)
    }

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.document.id.as_str()).collect()
    }

    fn mixed() -> Vec<Hit> {
        vec![
            hit("p1", Some("product"), 0.9),
            hit("f1", Some("faq"), 0.8),
            hit("x1", None, 0.75),
            hit("f2", Some("faq"), 0.7),
            hit("p2", Some("product"), 0.6),
            hit("b1", Some("blog"), 0.5),
        ]
    }

    #[test]
    fn rules_per_intent() {
        assert_eq!(TypeRule::for_intent("smalltalk"), TypeRule::Nothing);
        assert_eq!(TypeRule::for_intent("policy_returns"), TypeRule::OneOf(FAQ_ONLY));
        assert_eq!(TypeRule::for_intent("policy_anything"), TypeRule::OneOf(FAQ_ONLY));
        assert_eq!(TypeRule::for_intent("product_qa"), TypeRule::OneOf(PRODUCT_ONLY));
        assert_eq!(TypeRule::for_intent("promo_price"), TypeRule::OneOf(PRODUCT_OR_FAQ));
        assert_eq!(TypeRule::for_intent("handoff"), TypeRule::Any);
        assert_eq!(TypeRule::for_intent("order_status"), TypeRule::Any);
    }

    #[test]
    fn smalltalk_is_always_empty() {
        assert!(filter_hits(&mixed(), "smalltalk", 6).is_empty());
        assert!(filter_hits(&[], "smalltalk", 6).is_empty());
    }

    #[test]
    fn policy_keeps_faq_only_in_order() {
        let out = filter_hits(&mixed(), "policy_shipping", 6);
        assert_eq!(ids(&out), vec!["f1", "f2"]);
    }

    #[test]
    fn product_intents_keep_products() {
        assert_eq!(ids(&filter_hits(&mixed(), "product_search", 6)), vec!["p1", "p2"]);
        assert_eq!(ids(&filter_hits(&mixed(), "product_qa", 1)), vec!["p1"]);
    }

    #[test]
    fn promo_accepts_products_and_faqs() {
        let out = filter_hits(&mixed(), "promo_price", 3);
        assert_eq!(ids(&out), vec!["p1", "f1", "f2"]);
    }

    #[test]
    fn unknown_intent_passes_through_up_to_top_k() {
        let out = filter_hits(&mixed(), "handoff", 4);
        assert_eq!(ids(&out), vec!["p1", "f1", "x1", "f2"]);
    }

    #[test]
    fn fallback_returns_first_top_k_raw() {
        let raw = vec![
            hit("p1", Some("product"), 0.9),
            hit("b1", Some("blog"), 0.8),
            hit("p2", Some("product"), 0.7),
        ];
        let out = filter_hits(&raw, "policy_returns", 2);
        assert_eq!(out, raw[..2].to_vec());
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(filter_hits(&[], "policy_returns", 6).is_empty());
        assert!(filter_hits(&[], "handoff", 6).is_empty());
    }

    #[test]
    fn filtering_twice_changes_nothing() {
        for intent in ["policy_returns", "product_search", "promo_price", "handoff"] {
            for top_k in 1..=6 {
                let once = filter_hits(&mixed(), intent, top_k);
                let twice = filter_hits(&once, intent, top_k);
                assert_eq!(once, twice, "intent {intent} top_k {top_k}");
            }
        }
    }

    #[test]
    fn scenario_returns_policy_skips_top_product() {
        let raw = vec![
            hit("product", Some("product"), 0.9),
            hit("faq_a", Some("faq"), 0.8),
            hit("faq_b", Some("faq"), 0.7),
        ];
        let out = filter_hits(&raw, "policy_returns", 2);
        assert_eq!(ids(&out), vec!["faq_a", "faq_b"]);
    }

    #[test]
    fn zero_top_k_yields_nothing() {
        assert!(filter_hits(&mixed(), "handoff", 0).is_empty());
    }
}
