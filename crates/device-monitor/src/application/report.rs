//! Rendering of the per-device summary.

use serde::Serialize;
use telemetry_core::DeviceCount;

/// Output format for [`render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Xml,
    Json,
}

#[derive(Serialize)]
struct DevicesDocument<'a> {
    devices: &'a [DeviceCount],
}

/// Renders `summary` in the requested format.
///
/// # Errors
///
/// Only JSON rendering can fail, with the underlying `serde_json` error.
pub fn render(summary: &[DeviceCount], format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Xml => Ok(render_xml(summary)),
        ReportFormat::Json => render_json(summary),
    }
}

/// Renders the summary as an indented `<devices>` document.
///
/// ```
/// use device_monitor::application::render_xml;
/// use telemetry_core::DeviceCount;
///
/// let xml = render_xml(&[DeviceCount { device_id: 4, count: 2 }]);
/// assert!(xml.contains("<device_id>4</device_id>"));
/// ```
pub fn render_xml(summary: &[DeviceCount]) -> String {
    if summary.is_empty() {
        return "<devices />".to_string();
    }

    let mut out = String::from("<devices>\n");
    for device in summary {
        out.push_str("  <device>\n");
        out.push_str(&format!("    <device_id>{}</device_id>\n", device.device_id));
        out.push_str(&format!("    <count>{}</count>\n", device.count));
        out.push_str("  </device>\n");
    }
    out.push_str("</devices>");
    out
}

/// Renders the summary as pretty-printed `{"devices": [...]}` JSON.
///
/// # Errors
///
/// Returns the `serde_json` error if serialization fails.
pub fn render_json(summary: &[DeviceCount]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&DevicesDocument { devices: summary })
}
