use pretty_assertions::assert_eq;
use url::Url;
use watch_core::{JobRecord, NotificationRecord};
use watch_engine::{ExtractionWarning, PortalExtractor, JOBS_REGION};

const PORTAL_PAGE: &str = r#"<html><body>
  <div id="job-listings_wrapper">
    <table>
      <thead><tr><th>Company</th><th>Deadline</th><th>Posted</th><th></th></tr></thead>
      <tbody>
        <tr>
          <td> Acme </td><td>2024-01-01</td><td>2023-12-01</td>
          <td><a href="/j/1">View</a></td>
        </tr>
        <tr><td>Globex</td><td>2024-02-01</td></tr>
        <tr></tr>
      </tbody>
    </table>
  </div>
  <div id="newseventsx1">
    <table><tbody>
      <tr><td><a href="news/7">Placement drive</a></td><td>Notice</td><td>2023-12-02</td></tr>
      <tr><td>Holiday</td><td>Circular</td><td>2023-12-25</td></tr>
    </tbody></table>
  </div>
</body></html>"#;

#[test]
fn rows_map_to_records_by_column() {
    let extraction = PortalExtractor::default().extract(PORTAL_PAGE);

    assert_eq!(
        extraction.jobs,
        vec![
            JobRecord {
                company: "Acme".into(),
                deadline: "2024-01-01".into(),
                posted_date: "2023-12-01".into(),
                link: Some("https://tp.bitmesra.co.in/j/1".into()),
            },
            JobRecord {
                company: "Globex".into(),
                deadline: "2024-02-01".into(),
                posted_date: String::new(),
                link: None,
            },
        ]
    );
    assert_eq!(
        extraction.notifications,
        vec![
            NotificationRecord {
                title: "Placement drive".into(),
                kind: "Notice".into(),
                date: "2023-12-02".into(),
                link: Some("https://tp.bitmesra.co.in/news/7".into()),
            },
            NotificationRecord {
                title: "Holiday".into(),
                kind: "Circular".into(),
                date: "2023-12-25".into(),
                link: None,
            },
        ]
    );
    assert!(extraction.warnings.is_empty());
}

#[test]
fn links_follow_configured_base() {
    let base = Url::parse("https://portal.example/app/").unwrap();
    let extraction = PortalExtractor::new(Some(base)).extract(PORTAL_PAGE);
    assert_eq!(
        extraction.notifications[0].link.as_deref(),
        Some("https://portal.example/app/news/7")
    );
}

#[test]
fn extraction_is_deterministic() {
    let extractor = PortalExtractor::default();
    assert_eq!(extractor.extract(PORTAL_PAGE), extractor.extract(PORTAL_PAGE));
}

#[test]
fn empty_markup_yields_nothing_with_a_warning() {
    let extraction = PortalExtractor::default().extract("  \n ");
    assert!(extraction.jobs.is_empty());
    assert!(extraction.notifications.is_empty());
    assert_eq!(extraction.warnings, vec![ExtractionWarning::EmptyMarkup]);
}

#[test]
fn missing_region_is_a_warning_not_a_failure() {
    let markup = r#"<div id="newseventsx1"><table><tbody>
        <tr><td>Only news</td><td>Notice</td><td>2023-12-02</td></tr>
    </tbody></table></div>"#;
    let extraction = PortalExtractor::default().extract(markup);

    assert!(extraction.jobs.is_empty());
    assert_eq!(extraction.notifications.len(), 1);
    assert_eq!(
        extraction.warnings,
        vec![ExtractionWarning::MissingRegion(JOBS_REGION)]
    );
}
