use std::fmt::{self, Write};

use crate::{JobRecord, NotificationRecord};

const CELL_STYLE: &str = "border: 1px solid #ddd; padding: 8px; text-align: left;";
const NO_UPDATES_TEXT: &str = "This is a confirmation that the portal monitor is running on schedule. \
No new jobs or notifications were found during this check.";
const INITIAL_TEXT: &str = "The portal monitor has been initialized and is ready to watch the portal. \
The following is the content currently listed. You will be notified when new updates are posted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewJobs,
    NewNotifications,
    NoUpdates,
    InitialScrape,
}

impl EventKind {
    pub fn subject(self) -> &'static str {
        match self {
            EventKind::NewJobs => "New Job Listings Found",
            EventKind::NewNotifications => "New Notifications Found",
            EventKind::NoUpdates => "No New Updates Found",
            EventKind::InitialScrape => "Initial Scrape Complete",
        }
    }

    fn reports_absence(self) -> bool {
        matches!(self, EventKind::NewJobs | EventKind::NewNotifications)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subject())
    }
}

/// Records a report is about. Either slice may be empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportEntries<'a> {
    pub jobs: &'a [JobRecord],
    pub notifications: &'a [NotificationRecord],
}

/// A rendered report: HTML body plus a plain-text alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: EventKind,
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn format_report(kind: EventKind, entries: ReportEntries<'_>, checked_utc: &str) -> Report {
    Report {
        kind,
        subject: kind.subject().to_string(),
        html: render_html(kind, entries, checked_utc),
        text: render_text(kind, entries, checked_utc),
    }
}

fn render_html(kind: EventKind, entries: ReportEntries<'_>, checked_utc: &str) -> String {
    let mut html = format!("<h1>{}</h1>\n", escape(kind.subject()));

    if kind == EventKind::NoUpdates {
        let _ = writeln!(html, "<p>{NO_UPDATES_TEXT}</p>");
        push_footer(&mut html, checked_utc);
        return html;
    }
    if kind == EventKind::InitialScrape {
        let _ = writeln!(html, "<p>{INITIAL_TEXT}</p>");
    }

    if !entries.jobs.is_empty() {
        let rows: Vec<[&str; 3]> = entries
            .jobs
            .iter()
            .map(|job| [job.company.as_str(), job.deadline.as_str(), job.posted_date.as_str()])
            .collect();
        let links: Vec<Option<&str>> = entries.jobs.iter().map(|j| j.link.as_deref()).collect();
        push_table(
            &mut html,
            &format!("Jobs Found ({})", entries.jobs.len()),
            ["Company", "Deadline", "Posted On"],
            &rows,
            &links,
        );
    } else if kind.reports_absence() {
        html.push_str("<p>No new jobs found.</p>\n");
    }

    if !entries.notifications.is_empty() {
        let rows: Vec<[&str; 3]> = entries
            .notifications
            .iter()
            .map(|n| [n.title.as_str(), n.kind.as_str(), n.date.as_str()])
            .collect();
        let links: Vec<Option<&str>> = entries
            .notifications
            .iter()
            .map(|n| n.link.as_deref())
            .collect();
        push_table(
            &mut html,
            &format!("Notifications Found ({})", entries.notifications.len()),
            ["Title", "Type", "Date"],
            &rows,
            &links,
        );
    } else if kind.reports_absence() {
        html.push_str("<p>No new notifications found.</p>\n");
    }

    push_footer(&mut html, checked_utc);
    html
}

fn push_table(
    html: &mut String,
    heading: &str,
    headers: [&str; 3],
    rows: &[[&str; 3]],
    links: &[Option<&str>],
) {
    let _ = writeln!(html, "<h2>{}</h2>", escape(heading));
    html.push_str("<table style=\"width:100%; border-collapse: collapse;\">\n<thead><tr>");
    for header in headers.iter().copied().chain(["Link"]) {
        let _ = write!(html, "<th style=\"{CELL_STYLE}\">{header}</th>");
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for (cells, link) in rows.iter().zip(links) {
        html.push_str("<tr>");
        for cell in cells {
            let _ = write!(html, "<td style=\"{CELL_STYLE}\">{}</td>", escape(cell));
        }
        match link {
            Some(url) => {
                let _ = write!(
                    html,
                    "<td style=\"{CELL_STYLE}\"><a href=\"{}\">View Details</a></td>",
                    escape(url)
                );
            }
            None => {
                let _ = write!(html, "<td style=\"{CELL_STYLE}\">\u{2014}</td>");
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody></table>\n");
}

fn push_footer(html: &mut String, checked_utc: &str) {
    let _ = writeln!(
        html,
        "<p style=\"color: #888; font-size: small;\">Checked at {}</p>",
        escape(checked_utc)
    );
}

fn render_text(kind: EventKind, entries: ReportEntries<'_>, checked_utc: &str) -> String {
    let mut text = format!("{}\n\n", kind.subject());

    match kind {
        EventKind::NoUpdates => {
            let _ = writeln!(text, "{NO_UPDATES_TEXT}\n");
            let _ = writeln!(text, "Checked at {checked_utc}");
            return text;
        }
        EventKind::InitialScrape => {
            let _ = writeln!(text, "{INITIAL_TEXT}\n");
        }
        EventKind::NewJobs | EventKind::NewNotifications => {}
    }

    if !entries.jobs.is_empty() {
        let _ = writeln!(text, "Jobs Found ({}):", entries.jobs.len());
        for job in entries.jobs {
            let _ = writeln!(
                text,
                "- {} | deadline: {} | posted: {} | {}",
                job.company,
                job.deadline,
                job.posted_date,
                job.link.as_deref().unwrap_or("no link")
            );
        }
        text.push('\n');
    } else if kind.reports_absence() {
        text.push_str("No new jobs found.\n\n");
    }

    if !entries.notifications.is_empty() {
        let _ = writeln!(text, "Notifications Found ({}):", entries.notifications.len());
        for n in entries.notifications {
            let _ = writeln!(
                text,
                "- {} | type: {} | date: {} | {}",
                n.title,
                n.kind,
                n.date,
                n.link.as_deref().unwrap_or("no link")
            );
        }
        text.push('\n');
    } else if kind.reports_absence() {
        text.push_str("No new notifications found.\n\n");
    }

    let _ = writeln!(text, "Checked at {checked_utc}");
    text
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
