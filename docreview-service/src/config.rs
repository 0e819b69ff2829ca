//! Static configuration loaded at startup.
//!
//! Settings come from an optional `config` file plus `DOCREVIEW`-prefixed
//! environment variables. The field color palette is part of the
//! configuration so deployments can adjust it without a rebuild.

use serde::Deserialize;

/// Static configuration that cannot be changed at runtime
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub palette: FieldPalette,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Page rendering settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    /// Scale factor applied when rendering PDF pages to rasters.
    #[serde(default = "default_pdf_render_scale")]
    pub pdf_render_scale: f32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            pdf_render_scale: default_pdf_render_scale(),
        }
    }
}

/// Mapping from recognized field names to display colors
#[derive(Debug, Clone, Deserialize)]
pub struct FieldPalette {
    #[serde(default = "default_field_colors")]
    pub fields: Vec<FieldColor>,

    /// Color used for field names not present in `fields`.
    #[serde(default = "default_fallback_color")]
    pub fallback_color: String,
}

/// A single field name to color assignment
#[derive(Debug, Clone, Deserialize)]
pub struct FieldColor {
    pub name: String,
    pub color: String,
}

impl Default for FieldPalette {
    fn default() -> Self {
        Self {
            fields: default_field_colors(),
            fallback_color: default_fallback_color(),
        }
    }
}

impl FieldPalette {
    /// Look up the display color for a field name (case-insensitive).
    pub fn color_for(&self, field_name: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field_name))
            .map(|f| f.color.as_str())
            .unwrap_or(&self.fallback_color)
    }
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_pdf_render_scale() -> f32 {
    2.0
}

pub(crate) fn default_fallback_color() -> String {
    "#ff0000".to_string()
}

pub(crate) fn default_field_colors() -> Vec<FieldColor> {
    [
        ("InvoiceDate", "#CC543A"),
        ("InvoiceNumber", "#7BA23F"),
        ("VendorAddress", "#58B2DC"),
        ("VendorName", "#FFB11B"),
        ("CustomerAddress", "#2E5C6E"),
        ("TotalInvoiceAmount", "#A96360"),
        ("CustomerId", "#D7C4BB"),
        ("SubTotal", "#8F77B5"),
        ("TotalTax", "#EEA9A9"),
        ("CustomerName", "#24936E"),
        ("BillingAddress", "#994639"),
        ("DueDate", "#BEC23F"),
        ("ShippingAddress", "#26453D"),
    ]
    .into_iter()
    .map(|(name, color)| FieldColor {
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_lookup_is_case_insensitive() {
        let palette = FieldPalette::default();
        assert_eq!(palette.color_for("InvoiceDate"), "#CC543A");
        assert_eq!(palette.color_for("invoicedate"), "#CC543A");
        assert_eq!(palette.color_for("INVOICENUMBER"), "#7BA23F");
    }

    #[test]
    fn test_palette_fallback_color() {
        let palette = FieldPalette::default();
        assert_eq!(palette.color_for("SomethingElse"), "#ff0000");
    }
}
