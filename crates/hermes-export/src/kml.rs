//! KML document generation for geocoding results.
//!
//! Produces Google Earth compatible documents: geocoded addresses as green
//! pushpins, failures as red ones in a collapsed folder, with the original
//! record fields (semantic and passthrough) in each placemark description.
//! Pure string assembly; callers own all file I/O.

use hermes_core::models::GeocodeResult;

/// Placemark ceiling per document before the result set is chunked.
pub const DEFAULT_MAX_PLACEMARKS: usize = 2000;

/// Render one KML document containing every result.
pub fn generate_kml(results: &[GeocodeResult], doc_name: &str) -> String {
    let (matched, failed): (Vec<_>, Vec<_>) = results
        .iter()
        .partition(|r| r.success && (r.latitude != 0.0 || r.longitude != 0.0));

    let mut kml = String::with_capacity(1024 + results.len() * 512);
    kml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
"#);
    kml.push_str(&format!("    <name>{}</name>\n", escape_xml(doc_name)));
    kml.push_str(&format!(
        "    <description>{} addresses: {} geocoded, {} failed</description>\n",
        results.len(),
        matched.len(),
        failed.len()
    ));
    kml.push_str(
        r#"    <Style id="matchedIcon">
      <IconStyle>
        <color>ff00ff00</color>
        <scale>1.2</scale>
        <Icon>
          <href>http://maps.google.com/mapfiles/kml/pushpin/grn-pushpin.png</href>
        </Icon>
      </IconStyle>
    </Style>
    <Style id="failedIcon">
      <IconStyle>
        <color>ff0000ff</color>
        <scale>1.0</scale>
        <Icon>
          <href>http://maps.google.com/mapfiles/kml/pushpin/red-pushpin.png</href>
        </Icon>
      </IconStyle>
    </Style>
"#,
    );

    kml.push_str(&format!(
        "    <Folder>\n      <name>Geocoded ({})</name>\n      <open>1</open>\n",
        matched.len()
    ));
    for (i, result) in matched.iter().enumerate() {
        kml.push_str(&matched_placemark(result, i));
    }
    kml.push_str("    </Folder>\n");

    kml.push_str(&format!(
        "    <Folder>\n      <name>Failed ({})</name>\n      <open>0</open>\n",
        failed.len()
    ));
    for (i, result) in failed.iter().enumerate() {
        kml.push_str(&failed_placemark(result, i));
    }
    kml.push_str("    </Folder>\n  </Document>\n</kml>\n");

    kml
}

/// Render the result set as one or more documents, each holding at most
/// `max_placemarks` results. A single undersized set yields one document
/// named `doc_name`; larger sets get `part k/n` suffixes.
pub fn kml_documents(
    results: &[GeocodeResult],
    doc_name: &str,
    max_placemarks: usize,
) -> Vec<String> {
    let max = max_placemarks.max(1);
    if results.len() <= max {
        return vec![generate_kml(results, doc_name)];
    }

    let parts = results.len().div_ceil(max);
    results
        .chunks(max)
        .enumerate()
        .map(|(i, chunk)| generate_kml(chunk, &format!("{} (part {}/{})", doc_name, i + 1, parts)))
        .collect()
}

fn matched_placemark(result: &GeocodeResult, index: usize) -> String {
    format!(
        r#"      <Placemark>
        <name>{name}</name>
        <description><![CDATA[{description}]]></description>
        <styleUrl>#matchedIcon</styleUrl>
        <Point>
          <coordinates>{lon},{lat},0</coordinates>
        </Point>
      </Placemark>
"#,
        name = escape_xml(&placemark_name(result, index, "Point")),
        description = describe(result),
        lon = result.longitude,
        lat = result.latitude,
    )
}

fn failed_placemark(result: &GeocodeResult, index: usize) -> String {
    format!(
        r#"      <Placemark>
        <name>{name}</name>
        <description><![CDATA[{description}]]></description>
        <styleUrl>#failedIcon</styleUrl>
        <ExtendedData>
          <Data name="status">
            <value>failed</value>
          </Data>
          <Data name="matchLevel">
            <value>{level}</value>
          </Data>
        </ExtendedData>
      </Placemark>
"#,
        name = escape_xml(&placemark_name(result, index, "Failure")),
        description = describe(result),
        level = result.match_level,
    )
}

/// Pick a label: a passthrough name column if the source data had one,
/// then the street, then a numbered fallback.
fn placemark_name(result: &GeocodeResult, index: usize, fallback: &str) -> String {
    for key in ["name", "Name", "Nome"] {
        if let Some(value) = result.record.extra.get(key).and_then(|v| v.as_str())
            && !value.trim().is_empty()
        {
            return value.to_string();
        }
    }
    if let Some(street) = result.record.street.as_deref().filter(|s| !s.is_empty()) {
        return street.to_string();
    }
    format!("{} {}", fallback, index + 1)
}

/// HTML body for the placemark balloon.
fn describe(result: &GeocodeResult) -> String {
    let mut html = String::from(r#"<div style="font-family: Arial, sans-serif; font-size: 12px;">"#);

    if result.success {
        html.push_str(&format!(
            "<p><strong>Coordinates:</strong> {:.6}, {:.6}</p>",
            result.latitude, result.longitude
        ));
        html.push_str(&format!(
            "<p><strong>Match level:</strong> {}</p>",
            result.match_level
        ));
        if let Some(provider) = &result.source_provider {
            html.push_str(&format!("<p><strong>Provider:</strong> {provider}</p>"));
        }
    } else {
        html.push_str(&format!(
            "<p><strong>Status:</strong> {}</p>",
            result.match_level
        ));
        if let Some(detail) = &result.error_detail {
            html.push_str(&format!("<p><strong>Error:</strong> {detail}</p>"));
        }
    }

    html.push_str("<hr/><p><strong>Original address:</strong></p>");
    let record = &result.record;
    for (label, value) in [
        ("Street", record.street.as_deref()),
        ("Number", record.number.as_deref()),
        ("Neighborhood", record.neighborhood.as_deref()),
        ("City", record.city.as_deref()),
        ("Region", record.region.as_deref()),
        ("Postal code", record.postal_code.as_deref()),
    ] {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            html.push_str(&format!("<p><strong>{label}:</strong> {value}</p>"));
        }
    }

    if !record.extra.is_empty() {
        html.push_str("<hr/>");
        for (key, value) in &record.extra {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !rendered.trim().is_empty() {
                html.push_str(&format!("<p><strong>{key}:</strong> {rendered}</p>"));
            }
        }
    }

    if result.success && !result.display_name.is_empty() {
        html.push_str(&format!(
            "<hr/><p><strong>Resolved to:</strong> {}</p>",
            result.display_name
        ));
    }

    html.push_str("</div>");
    html
}

/// Escape the five XML special characters.
fn escape_xml(unsafe_str: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_str.len());
    for c in unsafe_str.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
