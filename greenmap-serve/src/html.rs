//! Page rendering
//!
//! Templates are compiled into the binary and carry a single `{{...}}`
//! placeholder each, filled from the loaded layer catalog.

use greenmap_data::LayerCatalog;
use std::fmt::Write;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const MAP_TEMPLATE: &str = include_str!("../templates/map.html");
const INFO_OVERVIEW_TEMPLATE: &str = include_str!("../templates/info_overview.html");

/// Landing page listing the available layers
pub fn render_index(catalog: &LayerCatalog) -> String {
    let mut items = String::new();
    for name in catalog.names() {
        let name = escape(&name);
        let _ = writeln!(items, r#"<li><a href="/layer/{name}">{name}</a></li>"#);
    }
    INDEX_TEMPLATE.replace("{{layers}}", &items)
}

/// Map page; the layer names are handed to the client script as a JSON array
pub fn render_map(catalog: &LayerCatalog) -> String {
    let names = serde_json::to_string(&catalog.names()).unwrap_or_else(|_| "[]".to_string());
    // Keep `</script>` inside a name from closing the inline script
    MAP_TEMPLATE.replace("{{layers}}", &names.replace("</", "<\\/"))
}

/// Overview page with one table row per layer
pub fn render_info_overview(catalog: &LayerCatalog) -> String {
    let mut rows = String::new();
    for summary in catalog.summaries() {
        let bbox = summary
            .bbox
            .map(|[min_x, min_y, max_x, max_y]| {
                format!("{min_x:.5}, {min_y:.5}, {max_x:.5}, {max_y:.5}")
            })
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&summary.name),
            escape(&summary.source),
            summary.feature_count,
            bbox
        );
    }
    INFO_OVERVIEW_TEMPLATE.replace("{{layers}}", &rows)
}

/// Escape text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
