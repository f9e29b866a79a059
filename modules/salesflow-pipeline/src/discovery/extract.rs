//! Pure HTML parsing for LinkedIn search, profile and company pages.
//!
//! Every lookup is a selector fallback chain tried in order. LinkedIn's
//! markup drifts, so none of these are expected to be exhaustive; a miss
//! yields `None` and the caller decides whether the lead is still usable.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::form_urlencoded;

pub const LINKEDIN_ORIGIN: &str = "https://www.linkedin.com";
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";

const AUTH_WALL_MARKERS: &[&str] = &["/login", "/authwall", "/checkpoint", "/uas/login"];

// =============================================================================
// Selector chains
// =============================================================================

const RESULT_ITEMS: &[&str] = &[
    ".search-results-container li",
    ".reusable-search__result-container",
    ".entity-result__item",
];

const RESULT_PROFILE_LINKS: &[&str] = &[
    ".search-result__result-link",
    "a[data-control-name='search_srp_result']",
    ".actor-name a",
    "h3 a",
    ".entity-result__title-text a",
    ".app-aware-link",
];

const NAME: &[&str] = &[
    "h1.text-heading-xlarge",
    ".pv-text-details__left-panel h1",
    ".text-heading-xlarge",
    "h1",
];

const EXPERIENCE_ITEM: &str = "li.artdeco-list__item";
const COMPANY_LOGO_LINK: &str = "a[data-field='experience_company_logo']";
const SUB_COMPONENTS: &str = ".pvs-entity__sub-components";
const SINGLE_COMPANY_NAME: &str =
    ".display-flex.align-items-center.mr1.hoverable-link-text.t-bold span[aria-hidden='true']";
const BOLD_TITLE: &str = ".display-flex.align-items-center.mr1.t-bold span[aria-hidden='true']";
const SUB_POSITION_TITLE: &str = ".pvs-entity__sub-components .t-bold span[aria-hidden='true']";
const COMPANY_LINE: &str = ".t-14.t-normal span[aria-hidden='true']";

const LOCATION: &[&str] = &[
    ".text-body-small.inline.t-black--light.break-words",
    ".pv-text-details__left-panel .text-body-small",
    ".text-body-small",
];

const COMPANY_RESULT_ITEMS: &[&str] = &[
    ".entity-result__item",
    ".reusable-search__result-container",
    ".search-results-container li",
];

const COMPANY_RESULT_LINKS: &[&str] = &[
    ".entity-result__title-text a",
    ".app-aware-link",
    "h3 a",
    ".result-card__title a",
];

const WEBSITE: &[&str] = &[
    ".org-about-module__margin-bottom a[href*='http']:not([href*='linkedin.com'])",
    "dd.mb4.t-black--light.text-body-medium a[href*='http']:not([href*='linkedin.com'])",
    ".link-without-visited-state[href*='http']:not([href*='linkedin.com'])",
    ".org-about-company-module a[href*='http']:not([href*='linkedin.com'])",
    ".org-top-card-summary-info-list__info-item a[href*='http']:not([href*='linkedin.com'])",
    "a[href*='www.']:not([href*='linkedin.com'])",
    "a[href*='http']:not([href*='linkedin.com']):not([href*='mailto']):not([href*='tel'])",
    ".company-page-details__website a",
    ".basic-info-about-company a[href*='http']",
];

const EXCLUDED_WEBSITE_PARTS: &[&str] = &[
    "linkedin.com",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "youtube.com",
    "mailto:",
    "tel:",
    "javascript:",
    "#",
];

static RE_VIEW_PROFILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"View .+?'s profile").unwrap());
static RE_DEGREE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"•\s*\d+\w*\s+(?:\d+\w*\s+)?degree connection").unwrap()
});

// =============================================================================
// Helpers
// =============================================================================

/// Parse a selector from the chains above; an unparsable entry is skipped.
fn sel(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Visible-ish text of an element with whitespace collapsed.
fn text_of(el: ElementRef<'_>) -> String {
    let raw = el.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_in<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    sel(css).and_then(|s| scope.select(&s).next())
}

fn all_in<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    sel(css).map(|s| scope.select(&s).collect()).unwrap_or_default()
}

/// Elements for the first selector in `chain` that matches anything.
fn first_nonempty<'a>(doc: &'a Html, chain: &[&str]) -> Vec<ElementRef<'a>> {
    chain
        .iter()
        .filter_map(|css| sel(css))
        .map(|s| doc.select(&s).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

fn strip_query(href: &str) -> &str {
    href.split(['?', '#']).next().unwrap_or(href)
}

/// Absolute URL for an href that may be site-relative.
fn absolute(href: &str) -> String {
    let href = strip_query(href.trim());
    if href.starts_with('/') {
        format!("{LINKEDIN_ORIGIN}{href}")
    } else {
        href.to_string()
    }
}

// =============================================================================
// URLs
// =============================================================================

/// True when a page URL shows LinkedIn bounced us to a login or challenge page.
pub fn is_auth_wall(url: &str) -> bool {
    AUTH_WALL_MARKERS.iter().any(|m| url.contains(m))
}

pub fn search_url(query: &str, page: u32) -> String {
    let params = form_urlencoded::Serializer::new(String::new())
        .append_pair("keywords", query)
        .append_pair("page", &page.to_string())
        .finish();
    format!("{LINKEDIN_ORIGIN}/search/results/people/?{params}")
}

pub fn company_search_url(company: &str) -> String {
    let params = form_urlencoded::Serializer::new(String::new())
        .append_pair("keywords", company)
        .finish();
    format!("{LINKEDIN_ORIGIN}/search/results/companies/?{params}")
}

/// The About tab of a company page, where the website link lives.
pub fn about_url(company_url: &str) -> String {
    let base = company_url.trim_end_matches('/');
    if base.ends_with("/about") {
        format!("{base}/")
    } else {
        format!("{base}/about/")
    }
}

// =============================================================================
// Search results
// =============================================================================

/// Profile URLs on a people-search results page, in page order, de-duplicated.
pub fn profile_urls(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut urls: Vec<String> = Vec::new();

    for item in first_nonempty(&doc, RESULT_ITEMS) {
        let from_chain = RESULT_PROFILE_LINKS.iter().find_map(|css| {
            all_in(item, css)
                .into_iter()
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.contains("/in/"))
        });
        let href = from_chain.or_else(|| {
            all_in(item, "a[href]")
                .into_iter()
                .filter_map(|a| a.value().attr("href"))
                .find(|href| {
                    href.contains("/in/")
                        && (href.contains("linkedin.com") || href.starts_with('/'))
                })
        });
        if let Some(href) = href {
            let url = absolute(href);
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

// =============================================================================
// Profile page
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyLink {
    /// A `/company/` page.
    Page(String),
    /// LinkedIn linked the logo to a generic search; the company must be looked up.
    Search,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDetails {
    pub name: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
    pub company_link: Option<CompanyLink>,
    pub location: Option<String>,
}

/// Strip LinkedIn chrome ("View Jane's profile", "• 2nd degree connection",
/// anything after the first line) from a scraped name.
pub fn clean_name(raw: &str) -> Option<String> {
    let text = RE_VIEW_PROFILE.replace_all(raw, "");
    let text = RE_DEGREE.replace_all(&text, "");
    let first_line = text.trim().lines().next().unwrap_or_default();
    let name = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    (!name.is_empty()).then_some(name)
}

fn meaningful(text: String) -> Option<String> {
    let t = text.trim();
    (t.chars().count() > 1).then(|| t.to_string())
}

pub fn parse_profile(html: &str) -> ProfileDetails {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let name = NAME
        .iter()
        .filter_map(|css| first_in(root, css))
        .find_map(|el| clean_name(&el.text().collect::<String>()));

    // Most recent position is the first experience entry with a company logo.
    let entry = all_in(root, EXPERIENCE_ITEM)
        .into_iter()
        .find(|li| first_in(*li, COMPANY_LOGO_LINK).is_some());

    let (role, company, company_link) = match entry {
        Some(entry) => {
            let (role, company) = if first_in(entry, SUB_COMPONENTS).is_some() {
                single_company_position(entry)
            } else {
                multi_company_position(entry)
            };
            (role, company, company_link(entry))
        }
        None => (None, None, None),
    };

    let location = LOCATION
        .iter()
        .filter_map(|css| first_in(root, css))
        .map(text_of)
        .find(|t| {
            !t.is_empty() && !t.to_lowercase().contains("connection") && t.chars().count() < 100
        });

    ProfileDetails {
        name,
        role,
        company,
        company_link,
        location,
    }
}

/// One company header with the positions held there nested underneath.
fn single_company_position(entry: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let company = first_in(entry, SINGLE_COMPANY_NAME).and_then(|e| meaningful(text_of(e)));
    let role = first_in(entry, SUB_POSITION_TITLE)
        .or_else(|| first_in(entry, BOLD_TITLE))
        .and_then(|e| meaningful(text_of(e)));
    (role, company)
}

/// Title in bold, company on the line below as "Acme · Full-time".
fn multi_company_position(entry: ElementRef<'_>) -> (Option<String>, Option<String>) {
    let role = first_in(entry, BOLD_TITLE).and_then(|e| meaningful(text_of(e)));
    let company = all_in(entry, COMPANY_LINE).into_iter().find_map(|e| {
        let text = text_of(e);
        let name = text.split('·').next().unwrap_or_default().trim().to_string();
        (name != "Present").then_some(name).and_then(meaningful)
    });
    (role, company)
}

fn company_link(entry: ElementRef<'_>) -> Option<CompanyLink> {
    let href = first_in(entry, COMPANY_LOGO_LINK)?.value().attr("href")?;
    let url = absolute(href);
    if url.contains("/company/") {
        Some(CompanyLink::Page(url))
    } else if url.contains("search/results/all") {
        Some(CompanyLink::Search)
    } else {
        None
    }
}

// =============================================================================
// Company pages
// =============================================================================

/// Company page URL among the first three company-search results whose
/// title contains (or is contained in) `company`.
pub fn parse_company_search(html: &str, company: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let wanted = company.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    first_nonempty(&doc, COMPANY_RESULT_ITEMS)
        .into_iter()
        .take(3)
        .find_map(|item| {
            let link = COMPANY_RESULT_LINKS
                .iter()
                .filter_map(|css| first_in(item, css))
                .find(|a| a.value().attr("href").is_some())?;
            let href = link.value().attr("href")?;
            let found = text_of(link).to_lowercase();
            let matches =
                !found.is_empty() && (found.contains(&wanted) || wanted.contains(&found));
            matches.then(|| absolute(href))
        })
}

/// External website link on a company About page.
pub fn parse_company_website(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    WEBSITE.iter().filter_map(|css| sel(css)).find_map(|s| {
        doc.select(&s)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|href| is_valid_website_url(href))
            .map(String::from)
    })
}

pub fn is_valid_website_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    if EXCLUDED_WEBSITE_PARTS.iter().any(|p| lower.contains(p)) {
        return false;
    }
    if !(lower.contains("http") || lower.contains("www.")) {
        return false;
    }
    (8..=200).contains(&url.len())
}
