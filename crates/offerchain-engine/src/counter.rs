//! Counter-offer chain validation.
//!
//! Classified pages are grouped into document units: the base contract,
//! counter offers and addenda. Each counter gets a type (who issued it) and
//! a validity verdict, and each extraction is attributed to the unit that
//! contains its first page.
//!
//! # Counter type
//!
//! Decided by the first rule that yields an answer:
//!
//! 1. Form code (BCO, SCO, SMCO)
//! 2. Title snippet ("buyer counter", "seller multiple counter", "seller counter")
//! 3. Signature asymmetry: only the buyer signed means the buyer issued it
//! 4. Position among all counters ordered by signature date: a lone counter
//!    is a seller counter; otherwise counters alternate starting with the
//!    seller. A counter with no signature dates cannot be placed when there
//!    are several, and stays unknown.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use offerchain_core::config::PriorityConfig;
use offerchain_core::{FormCode, PageMetadata, PageRole, ParsedExtraction, TermValue, TimelineEvent};
use serde::Serialize;

use crate::log::{ReconcileLog, Stage};
use crate::priority::{OrderKey, PagePriority, base_priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterType {
    Bco,
    Sco,
    Smco,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Buyer,
    Seller,
}

impl CounterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bco => "BCO",
            Self::Sco => "SCO",
            Self::Smco => "SMCO",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_form_code(code: &FormCode) -> Option<Self> {
        match code.as_str() {
            "BCO" => Some(Self::Bco),
            "SCO" => Some(Self::Sco),
            "SMCO" => Some(Self::Smco),
            _ => None,
        }
    }

    /// Party that issued the counter.
    pub fn origin(&self) -> Option<Party> {
        match self {
            Self::Bco => Some(Party::Buyer),
            Self::Sco | Self::Smco => Some(Party::Seller),
            Self::Unknown => None,
        }
    }

    /// Page count of the standard form.
    pub fn expected_pages(&self) -> Option<usize> {
        match self {
            Self::Bco => Some(1),
            Self::Sco | Self::Smco => Some(2),
            Self::Unknown => None,
        }
    }
}

/// Which rule decided a counter's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginRule {
    FormCode,
    TitleSnippet,
    SignatureAsymmetry,
    Position,
    Undetermined,
}

/// Latest signature of one party within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Signature {
    pub date: NaiveDate,
    pub page: u32,
    /// Confidence of the page that carries it.
    pub confidence: f64,
}

/// Terms a document states explicitly, merged from its extractions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatedTerms {
    pub fields: BTreeMap<String, TermValue>,
    pub events: BTreeMap<String, TimelineEvent>,
    pub confidence: BTreeMap<String, f64>,
    /// Lowest overall score of the extractions absorbed; `None` without any.
    pub overall: Option<f64>,
}

impl StatedTerms {
    fn absorb(&mut self, extraction: &ParsedExtraction) {
        for (name, value) in &extraction.fields {
            self.fields.insert(name.clone(), value.clone());
            self.confidence
                .insert(name.clone(), extraction.confidence_for(name));
        }
        for (key, event) in &extraction.timeline_events {
            self.events.insert(key.clone(), event.clone());
            self.confidence
                .insert(key.clone(), extraction.confidence_for(key));
        }
        let overall = extraction.overall_confidence;
        self.overall = Some(self.overall.map_or(overall, |o| o.min(overall)));
    }

    pub fn has_extraction(&self) -> bool {
        self.overall.is_some()
    }

    pub fn confidence_for(&self, name: &str) -> f64 {
        self.confidence
            .get(name)
            .copied()
            .or(self.overall)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseContract {
    pub form_code: FormCode,
    pub pages: Vec<u32>,
    pub buyer_signature: Option<Signature>,
    pub seller_signature: Option<Signature>,
    pub terms: StatedTerms,
}

impl BaseContract {
    pub fn label(&self) -> String {
        if self.form_code.is_unknown() {
            "Contract".to_string()
        } else {
            self.form_code.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterOfferUnit {
    pub counter_type: CounterType,
    pub origin_rule: OriginRule,
    pub number: u32,
    pub form_code: FormCode,
    pub pages: Vec<u32>,
    pub title: String,
    pub buyer_signature: Option<Signature>,
    pub seller_signature: Option<Signature>,
    pub modified: StatedTerms,
    pub valid: bool,
    pub notes: Vec<String>,
}

impl CounterOfferUnit {
    pub fn label(&self) -> String {
        match self.counter_type {
            CounterType::Unknown => format!("Counter #{}", self.number),
            t => format!("{} #{}", t.as_str(), self.number),
        }
    }

    pub fn has_buyer_signature(&self) -> bool {
        self.buyer_signature.is_some()
    }

    pub fn has_seller_signature(&self) -> bool {
        self.seller_signature.is_some()
    }

    pub fn latest_signature(&self) -> Option<NaiveDate> {
        latest_date(self.buyer_signature, self.seller_signature)
    }

    pub fn first_page(&self) -> u32 {
        self.pages[0]
    }

    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            tier: base_priority(PageRole::CounterOffer),
            date: self.latest_signature(),
            page: self.first_page(),
            follows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddendumUnit {
    pub label: String,
    pub form_code: FormCode,
    pub pages: Vec<u32>,
    pub buyer_signature: Option<Signature>,
    pub seller_signature: Option<Signature>,
    pub priority: f64,
    /// Label of the counter offer this addendum is merged after.
    pub attached_to: Option<String>,
    #[serde(skip)]
    pub attached_counter: Option<usize>,
    pub modified: StatedTerms,
    pub notes: Vec<String>,
}

impl AddendumUnit {
    pub fn latest_signature(&self) -> Option<NaiveDate> {
        latest_date(self.buyer_signature, self.seller_signature)
    }

    fn order_key(&self) -> OrderKey {
        OrderKey {
            tier: base_priority(PageRole::Addendum),
            date: self.latest_signature(),
            page: self.pages[0],
            follows: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    Counter(usize),
    Addendum(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentUnits {
    pub base: BaseContract,
    pub counters: Vec<CounterOfferUnit>,
    pub addenda: Vec<AddendumUnit>,
}

impl DocumentUnits {
    /// Valid counters and all addenda in merge order. The base contract is
    /// always applied first and is not listed.
    pub fn merge_plan(&self) -> Vec<MergeStep> {
        let mut keyed: Vec<(OrderKey, MergeStep)> = Vec::new();
        for (i, counter) in self.counters.iter().enumerate() {
            if counter.valid {
                keyed.push((counter.order_key(), MergeStep::Counter(i)));
            }
        }
        for (i, addendum) in self.addenda.iter().enumerate() {
            let key = match addendum.attached_counter {
                Some(ci) => self.counters[ci].order_key().followed(),
                None => addendum.order_key(),
            };
            keyed.push((key, MergeStep::Addendum(i)));
        }
        keyed.sort_by(|a, b| a.0.compare(&b.0));
        keyed.into_iter().map(|(_, step)| step).collect()
    }

    /// The counters that can decide acceptance: valid, with a known issuer.
    pub fn acceptance_candidates(&self) -> impl Iterator<Item = &CounterOfferUnit> {
        self.counters
            .iter()
            .filter(|c| c.valid && c.counter_type.origin().is_some())
    }
}

// ── Grouping ──

struct PageGroup<'a> {
    form_code: FormCode,
    number: Option<u32>,
    pages: Vec<&'a PageMetadata>,
}

impl<'a> PageGroup<'a> {
    fn start(page: &'a PageMetadata) -> Self {
        Self {
            form_code: page.form_code.clone(),
            number: page.counter_number,
            pages: vec![page],
        }
    }

    /// Continuation pages follow directly, carry the same form (signature
    /// pages may carry none) and never a different counter number.
    fn accepts(&self, page: &PageMetadata, lead_role: PageRole) -> bool {
        let contiguous = self
            .pages
            .last()
            .is_some_and(|last| page.page_number == last.page_number + 1);
        let same_form = page.form_code == self.form_code
            || (page.role == PageRole::Signatures && page.form_code.is_unknown());
        let same_number = match (page.counter_number, self.number) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        contiguous
            && (page.role == lead_role || page.role == PageRole::Signatures)
            && same_form
            && same_number
    }

    fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.page_number).collect()
    }

    fn title(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.title_snippet.trim())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

fn group_pages<'a>(
    pages: &'a [PageMetadata],
    starts: impl Fn(PageRole) -> bool,
) -> Vec<PageGroup<'a>> {
    let mut groups: Vec<PageGroup<'a>> = Vec::new();
    for page in pages {
        if let Some(group) = groups.last_mut()
            && let Some(lead) = group.pages.first().map(|p| p.role)
            && group.accepts(page, lead)
        {
            if group.number.is_none() {
                group.number = page.counter_number;
            }
            group.pages.push(page);
        } else if starts(page.role) {
            groups.push(PageGroup::start(page));
        }
    }
    groups
}

fn latest_signature_of(pages: &[&PageMetadata], party: Party) -> Option<Signature> {
    pages
        .iter()
        .filter_map(|p| {
            let date = match party {
                Party::Buyer => p.latest_buyer_signature(),
                Party::Seller => p.latest_seller_signature(),
            }?;
            Some(Signature {
                date,
                page: p.page_number,
                confidence: p.confidence,
            })
        })
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| a.page.cmp(&b.page)))
}

fn latest_date(a: Option<Signature>, b: Option<Signature>) -> Option<NaiveDate> {
    a.map(|s| s.date).max(b.map(|s| s.date))
}

// ── Counter type ──

fn type_by_title(title: &str) -> Option<CounterType> {
    let title = title.to_lowercase();
    if title.contains("seller multiple counter") {
        Some(CounterType::Smco)
    } else if title.contains("buyer counter") {
        Some(CounterType::Bco)
    } else if title.contains("seller counter") {
        Some(CounterType::Sco)
    } else {
        None
    }
}

fn type_by_signatures(buyer: bool, seller: bool) -> Option<CounterType> {
    match (buyer, seller) {
        (true, false) => Some(CounterType::Bco),
        (false, true) => Some(CounterType::Sco),
        _ => None,
    }
}

fn type_by_position(position: usize, total: usize, dated: bool) -> CounterType {
    if total == 1 {
        return CounterType::Sco;
    }
    if !dated {
        return CounterType::Unknown;
    }
    if position % 2 == 0 {
        CounterType::Sco
    } else {
        CounterType::Bco
    }
}

// ── Assembly ──

#[derive(Clone, Copy)]
enum Owner {
    Counter(usize),
    Addendum(usize),
}

/// Group pages into units, type and validate the counters, and attribute
/// each extraction to the unit holding its first page.
pub fn build_units(
    pages: &[PageMetadata],
    priorities: &[PagePriority],
    extractions: &[ParsedExtraction],
    config: &PriorityConfig,
    log: &mut ReconcileLog,
) -> DocumentUnits {
    let mut counters = build_counters(pages, config, log);
    let mut addenda = build_addenda(pages, priorities, &counters, log);

    let mut owner: BTreeMap<u32, Owner> = BTreeMap::new();
    for (i, c) in counters.iter().enumerate() {
        owner.extend(c.pages.iter().map(|&p| (p, Owner::Counter(i))));
    }
    for (i, a) in addenda.iter().enumerate() {
        owner.extend(a.pages.iter().map(|&p| (p, Owner::Addendum(i))));
    }

    let base_pages: Vec<&PageMetadata> = pages
        .iter()
        .filter(|p| !owner.contains_key(&p.page_number))
        .filter(|p| matches!(p.role, PageRole::MainContract | PageRole::Signatures))
        .collect();
    let mut base = BaseContract {
        form_code: base_pages
            .iter()
            .find(|p| p.role == PageRole::MainContract)
            .map(|p| p.form_code.clone())
            .unwrap_or_else(FormCode::unknown),
        pages: base_pages.iter().map(|p| p.page_number).collect(),
        buyer_signature: latest_signature_of(&base_pages, Party::Buyer),
        seller_signature: latest_signature_of(&base_pages, Party::Seller),
        terms: StatedTerms::default(),
    };

    for extraction in extractions {
        match owner.get(&extraction.first_page()) {
            Some(Owner::Counter(i)) => counters[*i].modified.absorb(extraction),
            Some(Owner::Addendum(i)) => addenda[*i].modified.absorb(extraction),
            None => base.terms.absorb(extraction),
        }
    }

    if !base.terms.has_extraction() {
        log.warn(
            Stage::Counters,
            "no extraction belongs to the base contract; base terms are empty",
        );
    }

    DocumentUnits {
        base,
        counters,
        addenda,
    }
}

fn build_counters(
    pages: &[PageMetadata],
    config: &PriorityConfig,
    log: &mut ReconcileLog,
) -> Vec<CounterOfferUnit> {
    let groups = group_pages(pages, |role| role == PageRole::CounterOffer);

    let mut seen_per_form: BTreeMap<String, u32> = BTreeMap::new();
    let mut units: Vec<CounterOfferUnit> = groups
        .iter()
        .map(|group| {
            let ordinal = seen_per_form
                .entry(group.form_code.to_string())
                .and_modify(|n| *n += 1)
                .or_insert(1);
            let buyer_signature = latest_signature_of(&group.pages, Party::Buyer);
            let seller_signature = latest_signature_of(&group.pages, Party::Seller);
            let title = group.title();

            let (counter_type, origin_rule) = if let Some(t) =
                CounterType::from_form_code(&group.form_code)
            {
                (t, OriginRule::FormCode)
            } else if let Some(t) = group
                .pages
                .iter()
                .find_map(|p| type_by_title(&p.title_snippet))
            {
                (t, OriginRule::TitleSnippet)
            } else if let Some(t) =
                type_by_signatures(buyer_signature.is_some(), seller_signature.is_some())
            {
                (t, OriginRule::SignatureAsymmetry)
            } else {
                (CounterType::Unknown, OriginRule::Undetermined)
            };

            CounterOfferUnit {
                counter_type,
                origin_rule,
                number: group.number.unwrap_or(*ordinal),
                form_code: group.form_code.clone(),
                pages: group.page_numbers(),
                title,
                buyer_signature,
                seller_signature,
                modified: StatedTerms::default(),
                valid: false,
                notes: Vec::new(),
            }
        })
        .collect();

    let mut by_date: Vec<usize> = (0..units.len()).collect();
    by_date.sort_by(|&a, &b| units[a].order_key().compare(&units[b].order_key()));
    let total = units.len();
    for (position, &i) in by_date.iter().enumerate() {
        let unit = &mut units[i];
        if unit.origin_rule == OriginRule::Undetermined {
            let dated = unit.latest_signature().is_some();
            unit.counter_type = type_by_position(position, total, dated);
            if unit.counter_type != CounterType::Unknown {
                unit.origin_rule = OriginRule::Position;
            }
        }
    }

    for unit in &mut units {
        validate_counter(unit, config);
        for note in &unit.notes {
            log.warn(Stage::Counters, format!("{}: {note}", unit.label()));
        }
    }
    log.info(
        Stage::Counters,
        format!(
            "{} counter offers, {} valid",
            units.len(),
            units.iter().filter(|u| u.valid).count()
        ),
    );
    units
}

fn validate_counter(unit: &mut CounterOfferUnit, config: &PriorityConfig) {
    unit.valid = unit.has_buyer_signature() && unit.has_seller_signature();
    if !unit.has_buyer_signature() {
        unit.notes
            .push("missing buyer signature; excluded from merge".to_string());
    }
    if !unit.has_seller_signature() {
        unit.notes
            .push("missing seller signature; excluded from merge".to_string());
    }
    // Only a type stated on the page implies a form layout.
    if matches!(
        unit.origin_rule,
        OriginRule::FormCode | OriginRule::TitleSnippet
    )
        && let Some(expected) = unit.counter_type.expected_pages()
        && unit.pages.len() != expected
    {
        unit.notes.push(format!(
            "{} pages where the form has {expected}",
            unit.pages.len()
        ));
        if config.counter_page_count_strict {
            unit.valid = false;
        }
    }
    if unit.counter_type == CounterType::Unknown {
        unit.notes
            .push("issuer undetermined; cannot decide acceptance".to_string());
    }
}

fn build_addenda(
    pages: &[PageMetadata],
    priorities: &[PagePriority],
    counters: &[CounterOfferUnit],
    log: &mut ReconcileLog,
) -> Vec<AddendumUnit> {
    let groups = group_pages(pages, |role| role.is_addendum());
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let numbers = group.page_numbers();
            let label = if group.form_code.is_unknown() {
                format!("Addendum #{}", i + 1)
            } else {
                format!("{} #{}", group.form_code, i + 1)
            };
            let attached_page = priorities
                .iter()
                .filter(|p| numbers.contains(&p.page_number))
                .find_map(|p| p.attached_to);
            let attached_counter =
                attached_page.and_then(|page| counters.iter().position(|c| c.pages.contains(&page)));
            let priority = priorities
                .iter()
                .filter(|p| numbers.contains(&p.page_number))
                .map(|p| p.priority)
                .fold(f64::INFINITY, f64::min);

            let buyer_signature = latest_signature_of(&group.pages, Party::Buyer);
            let seller_signature = latest_signature_of(&group.pages, Party::Seller);
            let mut notes = Vec::new();
            if buyer_signature.is_none() && seller_signature.is_none() {
                notes.push("unsigned; applied anyway".to_string());
            }
            for note in &notes {
                log.warn(Stage::Counters, format!("{label}: {note}"));
            }

            AddendumUnit {
                attached_to: attached_counter.map(|ci| counters[ci].label()),
                label,
                form_code: group.form_code.clone(),
                pages: numbers,
                buyer_signature,
                seller_signature,
                priority,
                attached_counter,
                modified: StatedTerms::default(),
                notes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::compute_priorities;
    use offerchain_core::ContentCategory;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct PageBuilder(PageMetadata);

    impl PageBuilder {
        fn new(n: u32, form: &str, role: PageRole) -> Self {
            Self(PageMetadata {
                page_number: n,
                form_code: if form.is_empty() {
                    FormCode::unknown()
                } else {
                    FormCode::new(form)
                },
                role,
                content_category: ContentCategory::TransactionTerms,
                has_filled_fields: true,
                confidence: 90.0,
                buyer_signature_dates: vec![],
                seller_signature_dates: vec![],
                title_snippet: String::new(),
                counter_number: None,
            })
        }
        fn buyer(mut self, date: NaiveDate) -> Self {
            self.0.buyer_signature_dates.push(date);
            self
        }
        fn seller(mut self, date: NaiveDate) -> Self {
            self.0.seller_signature_dates.push(date);
            self
        }
        fn number(mut self, n: u32) -> Self {
            self.0.counter_number = Some(n);
            self
        }
        fn title(mut self, t: &str) -> Self {
            self.0.title_snippet = t.to_string();
            self
        }
        fn build(self) -> PageMetadata {
            self.0
        }
    }

    fn units(pages: &[PageMetadata]) -> DocumentUnits {
        units_with(pages, &[], &PriorityConfig::default())
    }

    fn units_with(
        pages: &[PageMetadata],
        extractions: &[ParsedExtraction],
        config: &PriorityConfig,
    ) -> DocumentUnits {
        let priorities = compute_priorities(pages, config);
        let mut log = ReconcileLog::default();
        build_units(pages, &priorities, extractions, config, &mut log)
    }

    #[test]
    fn form_code_decides_type_and_groups_two_page_sco() {
        let pages = vec![
            PageBuilder::new(1, "RPA", PageRole::MainContract).buyer(d(2026, 1, 2)).build(),
            PageBuilder::new(2, "SCO", PageRole::CounterOffer).number(1).build(),
            PageBuilder::new(3, "SCO", PageRole::CounterOffer)
                .number(1)
                .seller(d(2026, 1, 4))
                .buyer(d(2026, 1, 5))
                .build(),
        ];
        let u = units(&pages);
        assert_eq!(u.counters.len(), 1);
        let sco = &u.counters[0];
        assert_eq!(sco.counter_type, CounterType::Sco);
        assert_eq!(sco.origin_rule, OriginRule::FormCode);
        assert_eq!(sco.pages, vec![2, 3]);
        assert!(sco.valid);
        assert!(sco.notes.is_empty(), "{:?}", sco.notes);
        assert_eq!(sco.label(), "SCO #1");
        assert_eq!(u.base.pages, vec![1]);
    }

    #[test]
    fn different_counter_numbers_split_units() {
        let pages = vec![
            PageBuilder::new(1, "BCO", PageRole::CounterOffer).number(1).build(),
            PageBuilder::new(2, "BCO", PageRole::CounterOffer).number(2).build(),
        ];
        let u = units(&pages);
        assert_eq!(u.counters.len(), 2);
        assert_eq!(u.counters[0].number, 1);
        assert_eq!(u.counters[1].number, 2);
    }

    #[test]
    fn missing_numbers_assigned_per_form_in_order() {
        let pages = vec![
            PageBuilder::new(1, "SCO", PageRole::CounterOffer).build(),
            PageBuilder::new(2, "RPA", PageRole::MainContract).build(),
            PageBuilder::new(3, "BCO", PageRole::CounterOffer).build(),
            PageBuilder::new(4, "RPA", PageRole::MainContract).build(),
            PageBuilder::new(5, "SCO", PageRole::CounterOffer).build(),
        ];
        let u = units(&pages);
        let numbers: Vec<_> = u.counters.iter().map(|c| (c.counter_type, c.number)).collect();
        assert_eq!(
            numbers,
            vec![
                (CounterType::Sco, 1),
                (CounterType::Bco, 1),
                (CounterType::Sco, 2)
            ]
        );
    }

    #[test]
    fn title_snippet_decides_type_without_form_code() {
        let pages = vec![
            PageBuilder::new(1, "", PageRole::CounterOffer)
                .title("Seller Multiple Counter Offer No. 1")
                .build(),
        ];
        let c = &units(&pages).counters[0];
        assert_eq!(c.counter_type, CounterType::Smco);
        assert_eq!(c.origin_rule, OriginRule::TitleSnippet);
    }

    #[test]
    fn signature_asymmetry_decides_type() {
        let pages = vec![
            PageBuilder::new(1, "", PageRole::CounterOffer)
                .buyer(d(2026, 1, 6))
                .build(),
        ];
        let c = &units(&pages).counters[0];
        assert_eq!(c.counter_type, CounterType::Bco);
        assert_eq!(c.origin_rule, OriginRule::SignatureAsymmetry);
        assert!(!c.valid);
    }

    #[test]
    fn single_undetermined_counter_is_seller() {
        let pages = vec![PageBuilder::new(1, "", PageRole::CounterOffer).build()];
        let c = &units(&pages).counters[0];
        assert_eq!(c.counter_type, CounterType::Sco);
        assert_eq!(c.origin_rule, OriginRule::Position);
    }

    #[test]
    fn two_undetermined_counters_alternate_by_date() {
        let pages = vec![
            PageBuilder::new(1, "", PageRole::CounterOffer)
                .number(2)
                .buyer(d(2026, 1, 8))
                .seller(d(2026, 1, 9))
                .build(),
            PageBuilder::new(2, "", PageRole::CounterOffer)
                .number(1)
                .buyer(d(2026, 1, 4))
                .seller(d(2026, 1, 3))
                .build(),
        ];
        let u = units(&pages);
        // Page 2 was signed first, so it is the seller's counter.
        assert_eq!(u.counters[1].counter_type, CounterType::Sco);
        assert_eq!(u.counters[0].counter_type, CounterType::Bco);
    }

    #[test]
    fn undated_counter_among_several_stays_unknown() {
        let pages = vec![
            PageBuilder::new(1, "", PageRole::CounterOffer).number(1).build(),
            PageBuilder::new(2, "", PageRole::CounterOffer)
                .number(2)
                .buyer(d(2026, 1, 4))
                .seller(d(2026, 1, 3))
                .build(),
        ];
        let u = units(&pages);
        assert_eq!(u.counters[0].counter_type, CounterType::Unknown);
        assert_eq!(u.counters[0].origin_rule, OriginRule::Undetermined);
        assert_eq!(u.acceptance_candidates().count(), 1);
    }

    #[test]
    fn page_count_mismatch_invalidates_unless_relaxed() {
        let pages = vec![
            PageBuilder::new(1, "SCO", PageRole::CounterOffer)
                .buyer(d(2026, 1, 5))
                .seller(d(2026, 1, 4))
                .build(),
        ];
        let strict = units(&pages);
        assert!(!strict.counters[0].valid);
        assert!(strict.counters[0].notes[0].contains("form has 2"));

        let relaxed = PriorityConfig {
            counter_page_count_strict: false,
            ..Default::default()
        };
        assert!(units_with(&pages, &[], &relaxed).counters[0].valid);
    }

    #[test]
    fn title_typed_counter_checks_page_count() {
        let pages = vec![
            PageBuilder::new(1, "", PageRole::CounterOffer)
                .title("Buyer Counter Offer No. 1")
                .buyer(d(2026, 1, 5))
                .build(),
            PageBuilder::new(2, "", PageRole::CounterOffer)
                .title("Buyer Counter Offer No. 1")
                .seller(d(2026, 1, 6))
                .build(),
        ];
        let c = &units(&pages).counters[0];
        assert_eq!(c.counter_type, CounterType::Bco);
        assert_eq!(c.origin_rule, OriginRule::TitleSnippet);
        assert!(!c.valid);
        assert!(c.notes.iter().any(|n| n.contains("form has 1")), "{:?}", c.notes);
    }

    #[test]
    fn inferred_type_skips_page_count() {
        // Typed by signature asymmetry: no layout to compare against.
        let pages = vec![
            PageBuilder::new(1, "", PageRole::CounterOffer).number(1).build(),
            PageBuilder::new(2, "", PageRole::CounterOffer)
                .number(1)
                .seller(d(2026, 1, 6))
                .build(),
            PageBuilder::new(3, "", PageRole::CounterOffer)
                .number(1)
                .build(),
        ];
        let c = &units(&pages).counters[0];
        assert_eq!(c.origin_rule, OriginRule::SignatureAsymmetry);
        assert!(c.notes.iter().all(|n| !n.contains("form has")), "{:?}", c.notes);
    }

    #[test]
    fn signature_page_joins_counter() {
        let pages = vec![
            PageBuilder::new(1, "SCO", PageRole::CounterOffer).seller(d(2026, 1, 6)).build(),
            PageBuilder::new(2, "", PageRole::Signatures).buyer(d(2026, 1, 7)).build(),
        ];
        let u = units(&pages);
        assert_eq!(u.counters[0].pages, vec![1, 2]);
        assert!(u.counters[0].valid);
        assert!(u.base.pages.is_empty());
    }

    #[test]
    fn extraction_attributed_by_first_page() {
        let pages = vec![
            PageBuilder::new(1, "RPA", PageRole::MainContract).build(),
            PageBuilder::new(2, "BCO", PageRole::CounterOffer)
                .buyer(d(2026, 1, 6))
                .seller(d(2026, 1, 7))
                .build(),
        ];
        let ex = |page: u32, price: i64| ParsedExtraction {
            pages: vec![page],
            fields: BTreeMap::from([(
                "purchase_price".to_string(),
                TermValue::Money(offerchain_core::Money::from_dollars(price as f64)),
            )]),
            overall_confidence: 90.0,
            field_confidence: BTreeMap::new(),
            timeline_events: BTreeMap::new(),
        };
        let u = units_with(&pages, &[ex(1, 500_000), ex(2, 505_000)], &PriorityConfig::default());
        assert!(u.base.terms.fields.contains_key("purchase_price"));
        assert_eq!(u.counters[0].modified.fields.len(), 1);
        assert_eq!(u.counters[0].modified.confidence_for("purchase_price"), 90.0);
    }

    #[test]
    fn attached_addendum_follows_its_counter_in_plan() {
        let pages = vec![
            PageBuilder::new(1, "RPA", PageRole::MainContract).buyer(d(2026, 1, 2)).build(),
            PageBuilder::new(2, "ADM", PageRole::Addendum).seller(d(2026, 1, 4)).build(),
            PageBuilder::new(3, "SCO", PageRole::CounterOffer).build(),
            PageBuilder::new(4, "SCO", PageRole::CounterOffer)
                .seller(d(2026, 1, 4))
                .buyer(d(2026, 1, 5))
                .build(),
            PageBuilder::new(5, "BCO", PageRole::CounterOffer)
                .buyer(d(2026, 1, 8))
                .seller(d(2026, 1, 9))
                .build(),
        ];
        let u = units(&pages);
        assert_eq!(u.addenda[0].attached_to.as_deref(), Some("SCO #1"));
        assert_eq!(u.addenda[0].priority, 2.5);
        assert_eq!(
            u.merge_plan(),
            vec![
                MergeStep::Counter(0),
                MergeStep::Addendum(0),
                MergeStep::Counter(1)
            ]
        );
    }

    #[test]
    fn invalid_counters_left_out_of_plan() {
        let pages = vec![
            PageBuilder::new(1, "BCO", PageRole::CounterOffer).buyer(d(2026, 1, 6)).build(),
        ];
        assert!(units(&pages).merge_plan().is_empty());
    }

    #[test]
    fn unsigned_addendum_is_noted() {
        let pages = vec![PageBuilder::new(1, "ADM", PageRole::Addendum).build()];
        let u = units(&pages);
        assert_eq!(u.addenda[0].label, "ADM #1");
        assert!(u.addenda[0].notes[0].contains("unsigned"));
        assert_eq!(u.merge_plan(), vec![MergeStep::Addendum(0)]);
    }
}
