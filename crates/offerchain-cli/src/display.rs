//! Vertical card display for reconciled transactions.
//!
//! Renders a [`ReconciledTransaction`] as grouped, human-readable sections:
//! the document chain, merged terms by schema group, the resolved timeline,
//! and the review verdict with its reasons.

use offerchain_core::TermValue;
use offerchain_engine::log::Level;
use offerchain_engine::{ReconciledTransaction, ReviewStatus};

const MAX_LIST_ITEMS: usize = 10;
const TITLE_MAX_CHARS: usize = 60;

// ── Field section groupings ──

const PROPERTY: &[&str] = &["property_address", "apn", "buyer_names", "seller_names"];

const PRICE: &[&str] = &[
    "purchase_price",
    "initial_deposit_amount",
    "increased_deposit_amount",
    "loan_amount",
    "down_payment_amount",
    "all_cash",
    "loan_type",
    "seller_credit_amount",
];

const DATES: &[&str] = &[
    "acceptance_date",
    "closing_date",
    "close_of_escrow_days",
    "initial_deposit_days",
    "seller_disclosure_days",
];

const CONTINGENCIES: &[&str] = &[
    "inspection_contingency_days",
    "appraisal_contingency_days",
    "loan_contingency_days",
];

const OTHER: &[&str] = &[
    "escrow_holder",
    "home_warranty",
    "home_warranty_cost",
    "home_warranty_paid_by",
];

// ── Public API ──

pub fn print_transaction(t: &ReconciledTransaction) {
    for line in render_transaction(t) {
        println!("{line}");
    }
}

/// One summary line for batch output.
pub fn summary_line(name: &str, t: &ReconciledTransaction) -> String {
    let acceptance = t
        .acceptance_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    let price = t
        .final_terms
        .get("purchase_price")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{name:<30} {:<13} accepted {acceptance:<10}  price {price:<14} {}",
        t.status.as_str(),
        t.chain
    )
}

pub fn render_transaction(t: &ReconciledTransaction) -> Vec<String> {
    let mut out = Vec::new();
    let address = t
        .final_terms
        .get("property_address")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(no address)".to_string());
    out.push(format!("=== {address} ==="));
    out.push(t.chain.clone());
    out.push(String::new());

    render_documents(t, &mut out);
    for (header, fields) in [
        ("Property & Parties", PROPERTY),
        ("Price & Financing", PRICE),
        ("Dates", DATES),
        ("Contingencies", CONTINGENCIES),
        ("Other Terms", OTHER),
    ] {
        render_field_section(t, header, fields, &mut out);
    }
    render_timeline(t, &mut out);
    render_review(t, &mut out);
    render_warnings(t, &mut out);
    out
}

// ── Section rendering ──

fn render_documents(t: &ReconciledTransaction, out: &mut Vec<String>) {
    out.push("Documents".to_string());
    out.push(format!(
        "  {:<26} pages {}",
        t.base.label(),
        page_list(&t.base.pages)
    ));
    for counter in t.counters.iter().take(MAX_LIST_ITEMS) {
        let verdict = if counter.valid { "valid" } else { "INVALID" };
        out.push(format!(
            "  {:<26} pages {:<8} {verdict:<8} {}",
            counter.label(),
            page_list(&counter.pages),
            truncate(&counter.title)
        ));
    }
    for addendum in t.addenda.iter().take(MAX_LIST_ITEMS) {
        let attached = addendum
            .attached_to
            .as_deref()
            .map(|c| format!("after {c}"))
            .unwrap_or_default();
        out.push(format!(
            "  {:<26} pages {:<8} {attached}",
            addendum.label,
            page_list(&addendum.pages)
        ));
    }
    let hidden = t.counters.len().saturating_sub(MAX_LIST_ITEMS)
        + t.addenda.len().saturating_sub(MAX_LIST_ITEMS);
    if hidden > 0 {
        out.push(format!("  ... and {hidden} more"));
    }
    out.push(String::new());
}

fn render_field_section(
    t: &ReconciledTransaction,
    header: &str,
    fields: &[&str],
    out: &mut Vec<String>,
) {
    let present: Vec<(&str, &TermValue)> = fields
        .iter()
        .filter_map(|&name| t.final_terms.get(name).map(|v| (name, v)))
        .collect();
    if present.is_empty() {
        return;
    }

    out.push(header.to_string());
    for (name, value) in present {
        let source = t
            .final_terms
            .sources
            .get(name)
            .map(String::as_str)
            .unwrap_or("-");
        let confidence = t
            .final_terms
            .field_confidence
            .get(name)
            .map(|c| format!("{c:.0}%"))
            .unwrap_or_default();
        out.push(format!(
            "  {name:<30} {:<24} {source:<22} {confidence}",
            value.to_string()
        ));
    }
    out.push(String::new());
}

fn render_timeline(t: &ReconciledTransaction, out: &mut Vec<String>) {
    if t.timeline.is_empty() {
        return;
    }
    let mut events: Vec<_> = t.timeline.values().collect();
    // Dated events chronologically, unresolved ones last.
    events.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.key.cmp(&b.key)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.key.cmp(&b.key),
    });

    out.push("Timeline".to_string());
    for event in events {
        let when = match (&event.date, &event.unresolved) {
            (Some(date), _) => date.format("%a %Y-%m-%d").to_string(),
            (None, Some(reason)) => format!("unresolved: {reason}"),
            (None, None) => "unresolved".to_string(),
        };
        out.push(format!(
            "  {:<34} {when:<28} ({})",
            event.display_name, event.timing
        ));
    }
    out.push(String::new());
}

fn render_review(t: &ReconciledTransaction, out: &mut Vec<String>) {
    out.push("Review".to_string());
    out.push(format!("  {:<26} {}", "status", t.status.as_str()));
    out.push(format!(
        "  {:<26} {:.1}",
        "overall confidence", t.confidence.overall
    ));
    if let Some(pages) = &t.confidence.pages {
        out.push(format!(
            "  {:<26} mean {:.1}, min {:.1}",
            "page confidence", pages.mean, pages.min
        ));
    }
    if t.status == ReviewStatus::NeedsReview {
        for reason in &t.confidence.reasons {
            out.push(format!("    - {reason}"));
        }
    }
    for low in &t.confidence.below_threshold {
        if low.tier != offerchain_core::FieldTier::Critical {
            out.push(format!(
                "    ~ {} {} at {:.1} (< {:.1})",
                low.tier.as_str(),
                low.field,
                low.confidence,
                low.threshold
            ));
        }
    }
    out.push(String::new());
}

fn render_warnings(t: &ReconciledTransaction, out: &mut Vec<String>) {
    let warnings: Vec<_> = t
        .log
        .entries()
        .iter()
        .filter(|e| e.level == Level::Warn)
        .collect();
    if warnings.is_empty() {
        return;
    }
    out.push(format!("Warnings ({})", warnings.len()));
    for entry in warnings {
        out.push(format!("  [{}] {}", entry.stage.as_str(), entry.message));
    }
    out.push(String::new());
}

// ── Helpers ──

fn page_list(pages: &[u32]) -> String {
    match (pages.first(), pages.last()) {
        (Some(first), Some(last)) if pages.len() > 1 && last - first + 1 == pages.len() as u32 => {
            format!("{first}-{last}")
        }
        _ => pages
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn truncate(title: &str) -> String {
    if title.chars().count() > TITLE_MAX_CHARS {
        let short: String = title.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{short}...")
    } else {
        title.to_string()
    }
}
