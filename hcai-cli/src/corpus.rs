//! The built-in article list, example questions and evaluation cases.

use std::collections::HashMap;

use hcai_rag::EvalCase;
use hcai_rag::document::{Document, SOURCE_KEY, TITLE_KEY};

/// Collection the CLI reads and writes unless told otherwise.
pub const DEFAULT_COLLECTION: &str = "healthcare_ai_500_large";

/// Where `ingest` writes the embedding backup and `query` reads it from.
pub const DEFAULT_BACKUP_PATH: &str = "data/embeddings_backup.json";

/// Articles fetched by `hcai ingest` when no `--url` is given.
pub const DEFAULT_URLS: [&str; 3] = [
    "https://www.beckerspayer.com/virtual-care/14-payer-ai-moves-in-2025/",
    "https://www.deloitte.com/us/en/insights/industry/health-care/life-sciences-and-health-care-industry-outlooks/2026-global-health-care-outlook.html",
    "https://www.norc.org/research/projects/use-ai-utilization-management.html",
];

const ELEVANCE_URL: &str =
    "https://www.fiercehealthcare.com/payers/look-inside-elevance-healths-artificial-intelligence-strategy";

// The publisher blocks automated clients, so this excerpt is bundled.
const ELEVANCE_TEXT: &str = "A look inside Elevance Health's artificial intelligence strategy

The pace of digital innovation in healthcare is rapidly accelerating, and, for the team at \
Elevance Health, a simple mantra remains at the heart of its efforts: Keep the member at the \
center.

Ratnakar Lavu, executive vice president and chief digital information officer at Elevance, told \
Fierce Healthcare in an interview that the perspective is born from his experience in consumer \
industries like retail, where many patients form their expectations for digital experiences.";

/// The hand-entered Elevance Health article.
pub fn elevance_document() -> Document {
    Document::manual(
        "elevance-ai-strategy",
        ELEVANCE_TEXT,
        HashMap::from([
            (SOURCE_KEY.to_string(), ELEVANCE_URL.to_string()),
            (TITLE_KEY.to_string(), "Elevance Health AI Strategy".to_string()),
        ]),
    )
}

/// Questions offered by the interactive loop's `examples` command.
pub const EXAMPLE_QUESTIONS: [&str; 5] = [
    "What is Elevance Health's AI strategy?",
    "How are payers using AI in 2025?",
    "What are the workforce challenges in healthcare?",
    "How is AI being used in utilization management?",
    "What are the cybersecurity concerns for health systems?",
];

/// Retrieval-only queries run by `hcai demo`, with what each one shows off.
pub const DEMO_QUERIES: [(&str, &str); 3] = [
    ("What is Elevance Health's AI strategy?", "Specific company AI strategy"),
    ("How are payers using AI in 2025?", "Industry trends and applications"),
    ("What are the main challenges for health systems in 2026?", "Future outlook and challenges"),
];

fn case(
    id: &str,
    question: &str,
    expected_answer: &str,
    keywords: &[&str],
    sources: &[&str],
) -> EvalCase {
    EvalCase {
        id: id.to_string(),
        question: question.to_string(),
        expected_answer: expected_answer.to_string(),
        expected_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        expected_sources: sources.iter().map(|s| s.to_string()).collect(),
    }
}

/// The five cases run by `hcai eval`.
///
/// Expected sources are fragments of the article URLs stored as `source`
/// metadata.
pub fn eval_cases() -> Vec<EvalCase> {
    vec![
        case(
            "1",
            "What is Elevance Health's AI strategy?",
            "Elevance Health has developed a comprehensive AI strategy that includes building a \
             unified AI platform, implementing responsible AI practices, focusing on \
             member-centered approaches, and deploying AI tools across the enterprise including \
             ChatGPT.",
            &["Elevance", "AI strategy", "responsible AI", "unified platform", "member-centered"],
            &["fiercehealthcare", "elevance"],
        ),
        case(
            "2",
            "How are payers using AI in 2025?",
            "Payers are using AI in 2025 for various applications including prior authorization, \
             utilization management, claims processing, fraud detection, member engagement, and \
             predictive analytics. Multiple payer organizations made significant AI moves in 2025.",
            &["payers", "AI", "2025", "utilization management", "prior authorization"],
            &["beckerspayer", "payer"],
        ),
        case(
            "3",
            "What are the top workforce challenges in healthcare for 2026?",
            "The top workforce challenges include attracting and retaining clinical staff, \
             addressing workforce shortages, managing burnout, and competing for talent in a tight \
             labor market. Deloitte identifies workforce challenges as a top concern for 2026.",
            &["workforce", "challenges", "clinical staff", "retention", "2026", "Deloitte"],
            &["deloitte", "health-care-outlook"],
        ),
        case(
            "4",
            "How is AI being used in utilization management?",
            "AI is being used in utilization management (UM) to automate prior authorization \
             decisions, review medical necessity, predict utilization patterns, and streamline \
             approval processes. NORC research discusses AI tools in utilization management.",
            &["AI", "utilization management", "UM", "prior authorization", "NORC"],
            &["norc", "utilization"],
        ),
        case(
            "5",
            "What cybersecurity concerns do health systems face?",
            "Health systems face cybersecurity concerns including data breaches, ransomware \
             attacks, protecting patient data, securing medical devices, and ensuring compliance \
             with privacy regulations. These are ongoing challenges as healthcare becomes more \
             digital.",
            &["cybersecurity", "health systems", "data breach", "security", "patient data"],
            &["deloitte", "health-care"],
        ),
    ]
}

/// Human-readable publisher name for a chunk's `source` URL.
pub fn source_label(source: Option<&str>) -> &'static str {
    let Some(source) = source else { return "Unknown" };
    let source = source.to_lowercase();
    if source.contains("beckerspayer") {
        "Becker's Payer Issues"
    } else if source.contains("deloitte") {
        "Deloitte"
    } else if source.contains("fierce") {
        "Fierce Healthcare"
    } else if source.contains("norc") {
        "NORC Research"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_known_publishers() {
        assert_eq!(source_label(Some(DEFAULT_URLS[0])), "Becker's Payer Issues");
        assert_eq!(source_label(Some(DEFAULT_URLS[1])), "Deloitte");
        assert_eq!(source_label(Some(ELEVANCE_URL)), "Fierce Healthcare");
        assert_eq!(source_label(Some(DEFAULT_URLS[2])), "NORC Research");
        assert_eq!(source_label(Some("https://example.com/post")), "Unknown");
        assert_eq!(source_label(None), "Unknown");
    }

    #[test]
    fn elevance_document_carries_its_source() {
        let doc = elevance_document();
        assert_eq!(doc.source(), Some(ELEVANCE_URL));
        assert_eq!(doc.source_uri.as_deref(), Some(ELEVANCE_URL));
        assert!(doc.text.starts_with("A look inside Elevance Health"));
        assert!(doc.text.contains("Keep the member at the center."));
    }

    #[test]
    fn eval_cases_are_complete() {
        let cases = eval_cases();
        assert_eq!(cases.len(), 5);
        assert!(
            cases.iter().all(|c| !c.expected_keywords.is_empty() && !c.expected_sources.is_empty())
        );
        let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
    }
}
