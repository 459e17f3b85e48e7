//! `gorisk sbom` — CycloneDX bill of materials

use super::{App, EXIT_OK};
use crate::output::cyclonedx;
use gorisk_ir::{GoriskError, Result};

pub fn run(app: &App, format: &str) -> Result<i32> {
    if format != "cyclonedx" {
        return Err(GoriskError::config(format!(
            "unsupported SBOM format: {format}"
        )));
    }
    let report = app.analyze()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&cyclonedx::render(&report))?
    );
    Ok(EXIT_OK)
}
