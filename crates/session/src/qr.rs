//! QR issuance policy.
//!
//! The native layer re-issues pairing codes periodically while a session
//! sits unauthenticated. Every issuance counts against a budget; once the
//! budget is exceeded the session is torn down instead of churning QR
//! codes forever. The budget resets only on successful authentication,
//! never on disconnect, so reconnect attempts keep accumulating.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use qrcode::{QrCode, render::svg};

/// Pairing-code state for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrRecord {
    /// The opaque code the user scans.
    pub code: String,
    /// Issuances since the last successful authentication.
    pub issue_count: u32,
    /// Epoch seconds of the most recent issuance.
    pub last_issued_at: i64,
}

impl QrRecord {
    /// Derived display form: an SVG data URL of the current code.
    /// Regenerated on demand, never stored authoritative. `None` when the
    /// code cannot be encoded (pathologically long input).
    #[must_use]
    pub fn rendered(&self) -> Option<String> {
        let qr = QrCode::new(self.code.as_bytes()).ok()?;
        let image = qr.render::<svg::Color<'_>>().min_dimensions(256, 256).build();
        Some(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
    }
}

/// Apply one issuance to the current record.
///
/// Pure: returns the updated record plus whether the post-increment count
/// now exceeds `limit`. Re-issuance of an identical code still counts.
/// The `exceeded` flag is a one-shot signal; the caller consumes it once
/// to drive teardown and never re-evaluates it retroactively.
#[must_use]
pub fn record_issuance(
    current: Option<&QrRecord>,
    code: &str,
    now: i64,
    limit: u32,
) -> (QrRecord, bool) {
    let issue_count = current.map_or(0, |r| r.issue_count) + 1;
    let record = QrRecord {
        code: code.to_string(),
        issue_count,
        last_issued_at: now,
    };
    let exceeded = issue_count > limit;
    (record, exceeded)
}
