pub const DEFAULT_DATABASE: &str = "sensors";

/// Connection settings for the InfluxDB write client
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl InfluxConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Empty strings count as "not set", matching unset flags
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self.password = password.filter(|p| !p.is_empty());
        self
    }
}
