//! peerhelp-report: Dashboard snapshots as JSON and self-contained HTML.

pub mod html;
pub mod report;

pub use html::{generate_html, write_html_report};
pub use report::ForumReport;
