//! Compiled classifier rule tables.
//!
//! Each table is an ordered list of `(predicate, result)` pairs; lookups scan
//! the page's edge lines (title block and footer) first, then the full text,
//! and the first matching entry wins.

use offerchain_core::config::ClassifierConfig;
use offerchain_core::{ContentCategory, FormCode, PageRole, ReconcileError};
use regex::Regex;

/// Page text prepared for table lookups.
pub struct PageText<'a> {
    pub raw: &'a str,
    /// First and last `edge_lines` non-empty lines, joined.
    pub edges: String,
    pub lower: String,
    pub edges_lower: String,
}

impl<'a> PageText<'a> {
    pub fn new(raw: &'a str, edge_lines: usize) -> Self {
        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        let edges = if lines.len() <= edge_lines * 2 {
            lines.join("\n")
        } else {
            let mut edge = lines[..edge_lines].to_vec();
            edge.extend_from_slice(&lines[lines.len() - edge_lines..]);
            edge.join("\n")
        };
        let edges_lower = edges.to_lowercase();
        Self {
            raw,
            edges,
            lower: raw.to_lowercase(),
            edges_lower,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// The two search scopes in lookup order.
    fn scopes(&self) -> [&str; 2] {
        [&self.edges, self.raw]
    }

    fn lower_scopes(&self) -> [&str; 2] {
        [&self.edges_lower, &self.lower]
    }
}

/// How a page role was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    PrimaryForm,
    FormTable,
    Keyword,
    Default,
}

pub struct ClassifierTables {
    edge_lines: usize,
    form_patterns: Vec<(FormCode, Vec<Regex>)>,
    primary_contract_forms: Vec<FormCode>,
    form_roles: Vec<(FormCode, PageRole)>,
    role_keywords: Vec<(PageRole, Vec<String>)>,
    category_keywords: Vec<(ContentCategory, Vec<String>)>,
    signature_keywords: Vec<String>,
}

impl ClassifierTables {
    /// Compile the configured tables. A bad regex fails construction.
    pub fn compile(config: &ClassifierConfig) -> Result<Self, ReconcileError> {
        let mut form_patterns = Vec::with_capacity(config.form_patterns.len());
        for fp in &config.form_patterns {
            let compiled = fp
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| ReconcileError::InvalidPattern {
                        pattern: p.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            form_patterns.push((FormCode::new(&fp.code), compiled));
        }

        Ok(Self {
            edge_lines: config.edge_lines,
            form_patterns,
            primary_contract_forms: config
                .primary_contract_forms
                .iter()
                .map(|c| FormCode::new(c))
                .collect(),
            form_roles: config
                .form_roles
                .iter()
                .map(|fr| (FormCode::new(&fr.code), fr.role))
                .collect(),
            role_keywords: config
                .role_keywords
                .iter()
                .map(|rk| (rk.role, lowercase_all(&rk.keywords)))
                .collect(),
            category_keywords: config
                .category_keywords
                .iter()
                .map(|ck| (ck.category, lowercase_all(&ck.keywords)))
                .collect(),
            signature_keywords: lowercase_all(&config.signature_keywords),
        })
    }

    pub fn page_text<'a>(&self, raw: &'a str) -> PageText<'a> {
        PageText::new(raw, self.edge_lines)
    }

    /// First form whose pattern matches, edges before full text.
    pub fn detect_form_code(&self, page: &PageText<'_>) -> FormCode {
        for scope in page.scopes() {
            let hit = self
                .form_patterns
                .iter()
                .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(scope)));
            if let Some((code, _)) = hit {
                return code.clone();
            }
        }
        FormCode::unknown()
    }

    pub fn is_primary_contract(&self, code: &FormCode) -> bool {
        self.primary_contract_forms.contains(code)
    }

    pub fn detect_role(&self, code: &FormCode, page: &PageText<'_>) -> (PageRole, RoleSource) {
        if self.is_primary_contract(code) {
            return (PageRole::MainContract, RoleSource::PrimaryForm);
        }
        if let Some((_, role)) = self.form_roles.iter().find(|(c, _)| c == code) {
            return (*role, RoleSource::FormTable);
        }
        match first_keyword_hit(&self.role_keywords, page) {
            Some(role) => (role, RoleSource::Keyword),
            None => (PageRole::Other, RoleSource::Default),
        }
    }

    /// Keyword table only; the numeric fallback lives in the classifier.
    pub fn category_by_keyword(&self, page: &PageText<'_>) -> Option<ContentCategory> {
        first_keyword_hit(&self.category_keywords, page)
    }

    pub fn mentions_signatures(&self, page: &PageText<'_>) -> bool {
        self.signature_keywords
            .iter()
            .any(|k| page.lower.contains(k.as_str()))
    }
}

fn first_keyword_hit<T: Copy>(table: &[(T, Vec<String>)], page: &PageText<'_>) -> Option<T> {
    page.lower_scopes().into_iter().find_map(|scope| {
        table
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| scope.contains(k.as_str())))
            .map(|(value, _)| *value)
    })
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
