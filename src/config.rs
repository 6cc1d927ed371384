use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "apt-intel";
const ENV_PREFIX: &str = "APT";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_results: usize,
    pub sources: SourceUrls,
}

/// Base URLs for every source. Overridable so mirrors and tests can redirect them.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceUrls {
    pub etda_base: String,
    pub mitre_base: String,
    pub google_cloud_url: String,
    pub netenrich_base: String,
    pub socradar_base: String,
    pub pulsedive_base: String,
    pub qianxin_base: String,
    pub malpedia_base: String,
    pub aptnotes_url: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        SourceUrls {
            etda_base: "https://apt.etda.or.th".into(),
            mitre_base: "https://attack.mitre.org".into(),
            google_cloud_url: "https://cloud.google.com/security/resources/insights/apt-groups"
                .into(),
            netenrich_base: "https://know.netenrich.com".into(),
            socradar_base: "https://socradar.io".into(),
            pulsedive_base: "https://pulsedive.com".into(),
            qianxin_base: "https://ti.qianxin.com".into(),
            malpedia_base: "https://malpedia.caad.fkie.fraunhofer.de".into(),
            aptnotes_url: "https://raw.githubusercontent.com/aptnotes/data/master/APTnotes.json"
                .into(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.into(),
            max_results: 10,
            sources: SourceUrls::default(),
        }
    }
}

impl Settings {
    /// Defaults, then `apt-intel.toml` if present, then `APT_*` environment variables.
    pub fn load() -> Result<Self> {
        let defaults = Settings::default();
        let s = &defaults.sources;
        let settings = Config::builder()
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("user_agent", defaults.user_agent.clone())?
            .set_default("max_results", defaults.max_results as u64)?
            .set_default("sources.etda_base", s.etda_base.clone())?
            .set_default("sources.mitre_base", s.mitre_base.clone())?
            .set_default("sources.google_cloud_url", s.google_cloud_url.clone())?
            .set_default("sources.netenrich_base", s.netenrich_base.clone())?
            .set_default("sources.socradar_base", s.socradar_base.clone())?
            .set_default("sources.pulsedive_base", s.pulsedive_base.clone())?
            .set_default("sources.qianxin_base", s.qianxin_base.clone())?
            .set_default("sources.malpedia_base", s.malpedia_base.clone())?
            .set_default("sources.aptnotes_url", s.aptnotes_url.clone())?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("Invalid apt-intel configuration")
    }

    /// A `--timeout` given on the command line wins over every other layer.
    pub fn override_timeout(&mut self, secs: Option<u64>) {
        if let Some(secs) = secs {
            self.timeout_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // `load` reads the process environment, so tests touching it run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets variables for the life of the guard.
    struct EnvGuard(Vec<&'static str>);

    impl EnvGuard {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            EnvGuard(vars.iter().map(|(key, _)| *key).collect())
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn defaults_point_at_public_sources() {
        let s = Settings::default();
        assert_eq!(s.timeout_secs, 30);
        assert_eq!(s.max_results, 10);
        assert!(s.sources.mitre_base.starts_with("https://attack.mitre.org"));
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let s = Settings::load().unwrap();
        assert!(!s.user_agent.is_empty());
        assert!(s.sources.etda_base.contains("etda"));
    }

    #[test]
    fn environment_overrides_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = EnvGuard::set(&[
            ("APT_TIMEOUT_SECS", "7"),
            ("APT_MAX_RESULTS", "3"),
            ("APT_SOURCES__MITRE_BASE", "https://mirror.test"),
        ]);

        let s = Settings::load().unwrap();
        assert_eq!(s.timeout_secs, 7);
        assert_eq!(s.max_results, 3);
        assert_eq!(s.sources.mitre_base, "https://mirror.test");
        assert_eq!(s.sources.etda_base, SourceUrls::default().etda_base);
    }

    #[test]
    fn command_line_timeout_wins() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _env = EnvGuard::set(&[("APT_TIMEOUT_SECS", "7")]);

        let mut s = Settings::load().unwrap();
        s.override_timeout(Some(2));
        assert_eq!(s.timeout_secs, 2);

        s.override_timeout(None);
        assert_eq!(s.timeout_secs, 2);
    }
}
