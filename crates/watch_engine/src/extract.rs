use std::fmt;

use scraper::{ElementRef, Html, Selector};
use url::Url;
use watch_core::{JobRecord, NotificationRecord};
use watch_logging::watch_warn;

use crate::links::resolve_link;

/// Container of the job listings table.
pub const JOBS_REGION: &str = "#job-listings_wrapper";
/// Container of the notifications table.
pub const NOTIFICATIONS_REGION: &str = "#newseventsx1";

pub const DEFAULT_BASE_URL: &str = "https://tp.bitmesra.co.in/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionWarning {
    EmptyMarkup,
    MissingRegion(&'static str),
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::EmptyMarkup => write!(f, "no markup to extract from"),
            ExtractionWarning::MissingRegion(region) => {
                write!(f, "region {region} not found in markup")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub jobs: Vec<JobRecord>,
    pub notifications: Vec<NotificationRecord>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Maps the portal's two tables onto records by column position.
///
/// Jobs: company | deadline | posted | link.
/// Notifications: title (with link) | type | date.
#[derive(Debug, Clone)]
pub struct PortalExtractor {
    base_url: Option<Url>,
}

impl PortalExtractor {
    pub fn new(base_url: Option<Url>) -> Self {
        Self { base_url }
    }

    pub fn extract(&self, markup: &str) -> Extraction {
        if markup.trim().is_empty() {
            watch_warn!("{}", ExtractionWarning::EmptyMarkup);
            return Extraction {
                warnings: vec![ExtractionWarning::EmptyMarkup],
                ..Extraction::default()
            };
        }

        let doc = Html::parse_document(markup);
        let mut warnings = Vec::new();

        let jobs = self
            .region_rows(&doc, JOBS_REGION, &mut warnings)
            .into_iter()
            .filter_map(|row| self.job_from_row(row))
            .collect();
        let notifications = self
            .region_rows(&doc, NOTIFICATIONS_REGION, &mut warnings)
            .into_iter()
            .filter_map(|row| self.notification_from_row(row))
            .collect();

        for warning in &warnings {
            watch_warn!("{warning}");
        }

        Extraction {
            jobs,
            notifications,
            warnings,
        }
    }

    fn region_rows<'a>(
        &self,
        doc: &'a Html,
        region: &'static str,
        warnings: &mut Vec<ExtractionWarning>,
    ) -> Vec<ElementRef<'a>> {
        let (Some(region_sel), Some(row_sel)) = (
            Selector::parse(region).ok(),
            Selector::parse("tbody tr").ok(),
        ) else {
            return Vec::new();
        };
        let Some(container) = doc.select(&region_sel).next() else {
            warnings.push(ExtractionWarning::MissingRegion(region));
            return Vec::new();
        };
        container.select(&row_sel).collect()
    }

    fn job_from_row(&self, row: ElementRef<'_>) -> Option<JobRecord> {
        let cells = cells(row);
        if cells.is_empty() {
            return None;
        }
        let link = cells
            .get(3)
            .and_then(|cell| self.first_link(*cell))
            .or_else(|| self.first_link(row));
        Some(JobRecord {
            company: cell_text(&cells, 0),
            deadline: cell_text(&cells, 1),
            posted_date: cell_text(&cells, 2),
            link,
        })
    }

    fn notification_from_row(&self, row: ElementRef<'_>) -> Option<NotificationRecord> {
        let cells = cells(row);
        if cells.is_empty() {
            return None;
        }
        Some(NotificationRecord {
            title: cell_text(&cells, 0),
            kind: cell_text(&cells, 1),
            date: cell_text(&cells, 2),
            link: self.first_link(cells[0]),
        })
    }

    fn first_link(&self, scope: ElementRef<'_>) -> Option<String> {
        let anchor = Selector::parse("a[href]").ok()?;
        scope
            .select(&anchor)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|href| resolve_link(href, self.base_url.as_ref()))
    }
}

impl Default for PortalExtractor {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_BASE_URL).ok())
    }
}

fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    match Selector::parse("td") {
        Ok(td) => row.select(&td).collect(),
        Err(_) => Vec::new(),
    }
}

fn cell_text(cells: &[ElementRef<'_>], idx: usize) -> String {
    cells
        .get(idx)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
