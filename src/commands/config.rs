//! `appcheck config` command.

use crate::config::{DataBackend, Settings, SettingsSources};

/// Execute the `config` command.
///
/// Resolves settings, validates them, and prints every key with secrets
/// masked.
///
/// # Errors
///
/// Returns an error string if the config file is unreadable or a required
/// setting is missing.
pub fn run(sources: &SettingsSources) -> Result<(), String> {
    let settings = Settings::load(sources).map_err(|e| e.to_string())?;
    print!("{}", render(&settings)?);
    Ok(())
}

fn render(settings: &Settings) -> Result<String, String> {
    let backend = settings.validate().map_err(|e| e.to_string())?;
    let pairs = settings.redacted();
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (key, value) in &pairs {
        out.push_str(&format!("{key:<width$}  {value}\n"));
    }
    let backend = match backend {
        DataBackend::Datastore => "datastore",
        DataBackend::CloudSql => "cloudsql",
        DataBackend::MongoDb => "mongodb",
    };
    out.push_str(&format!("\nSettings are valid for the {backend} backend.\n"));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_masked_settings() {
        let settings = Settings::from_pairs([
            ("GCLOUD_PROJECT", "demo"),
            ("CLOUD_BUCKET", "bucket"),
            ("OAUTH2_CLIENT_ID", "id"),
            ("OAUTH2_CLIENT_SECRET", "shh"),
        ]);

        let out = render(&settings).unwrap();

        assert!(out.contains("GCLOUD_PROJECT        demo"));
        assert!(out.contains("OAUTH2_CLIENT_SECRET  ********"));
        assert!(!out.contains("shh"));
        assert!(out.ends_with("valid for the datastore backend.\n"));
    }

    #[test]
    fn missing_setting_is_an_error() {
        let err = render(&Settings::from_pairs([("GCLOUD_PROJECT", "demo")])).unwrap_err();
        assert!(err.contains("CLOUD_BUCKET"));
    }
}
