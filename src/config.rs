use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Local,
    Drive,
    Mirrored,
}

impl Backend {
    pub fn serves_local_files(self) -> bool {
        matches!(self, Backend::Local | Backend::Mirrored)
    }
}

/// What the mirrored store does when the Drive half of a write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorPolicy {
    BestEffort,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub api_key: Option<String>,
    pub folder_id: Option<String>,
    pub share_publicly: bool,
    pub api_base: String,
    pub token_url: String,
    pub auth_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            access_token: None,
            refresh_token: None,
            api_key: None,
            folder_id: None,
            share_publicly: true,
            api_base: "https://www.googleapis.com".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub data_dir: String,
    pub max_body_size: usize,
    pub backend: Backend,
    pub mirror_policy: MirrorPolicy,
    pub require_login: bool,
    pub google: GoogleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            data_dir: "./data".to_string(),
            max_body_size: 10 * 1024 * 1024,
            backend: Backend::Local,
            mirror_policy: MirrorPolicy::BestEffort,
            require_login: false,
            google: GoogleConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Path::new("config.toml");
        if config_path.exists() {
            let mut file = std::fs::File::open(config_path)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Config::default();
            let toml_string = toml::to_string_pretty(&default_config)?;
            let mut file = std::fs::File::create(config_path)?;
            file.write_all(toml_string.as_bytes())?;
            Ok(default_config)
        }
    }

    pub fn from_env_config() -> anyhow::Result<Self> {
        let mut final_cfg = Self::load()?;
        final_cfg.apply_env(|key| std::env::var(key).ok())?;
        final_cfg.validate()?;
        Ok(final_cfg)
    }

    /// Overlays environment values; `lookup` is injectable so tests don't touch the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a port number, got {port:?}"))?;
            self.listen = format!("0.0.0.0:{port}");
        }
        if let Some(dir) = lookup("DOODLE_DATA_DIR") {
            self.data_dir = dir;
        }
        if let Some(backend) = lookup("DOODLE_BACKEND") {
            self.backend = match backend.to_ascii_lowercase().as_str() {
                "local" => Backend::Local,
                "drive" => Backend::Drive,
                "mirrored" => Backend::Mirrored,
                other => anyhow::bail!("unknown DOODLE_BACKEND {other:?}"),
            };
        }
        if let Some(flag) = lookup("DOODLE_REQUIRE_LOGIN") {
            self.require_login = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        let g = &mut self.google;
        let overlay = |slot: &mut Option<String>, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = Some(v);
            }
        };
        overlay(&mut g.client_id, "GOOGLE_CLIENT_ID");
        overlay(&mut g.client_secret, "GOOGLE_CLIENT_SECRET");
        overlay(&mut g.redirect_uri, "GOOGLE_REDIRECT_URI");
        overlay(&mut g.access_token, "GOOGLE_ACCESS_TOKEN");
        overlay(&mut g.refresh_token, "GOOGLE_REFRESH_TOKEN");
        overlay(&mut g.api_key, "GOOGLE_API_KEY");
        overlay(&mut g.folder_id, "DRIVE_FOLDER_ID");
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if matches!(self.backend, Backend::Drive | Backend::Mirrored)
            && self.google.folder_id.is_none()
        {
            anyhow::bail!("the {:?} backend needs google.folder_id (DRIVE_FOLDER_ID)", self.backend);
        }
        if self.require_login
            && (self.google.client_id.is_none()
                || self.google.client_secret.is_none()
                || self.google.redirect_uri.is_none())
        {
            anyhow::bail!("require_login needs google client_id, client_secret and redirect_uri");
        }
        Ok(())
    }

    pub fn doodle_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("doodles")
    }
}
