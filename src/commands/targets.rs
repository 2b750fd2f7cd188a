//! `appcheck targets` command.

use std::path::Path;

use crate::manifest::Manifest;

/// Execute the `targets` command.
///
/// # Errors
///
/// Returns an error string if the manifest cannot be loaded.
pub fn run(manifest_path: &Path) -> Result<(), String> {
    let manifest = Manifest::load(manifest_path).map_err(|e| e.to_string())?;
    print!("{}", render(&manifest));
    Ok(())
}

fn render(manifest: &Manifest) -> String {
    if manifest.targets.is_empty() {
        return "No targets found in manifest.\n".to_string();
    }
    let name_width = manifest.targets.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);

    let mut out = format!("{:<name_width$}  {:<7}  EXPECTS\n", "NAME", "PROMOTE");
    for target in &manifest.targets {
        let promote = if target.promote { "yes" } else { "no" };
        out.push_str(&format!("{:<name_width$}  {promote:<7}  {}\n", target.name, target.msg));
    }
    out.push_str(&format!("\n{} target(s) total.\n", manifest.targets.len()));
    out
}
