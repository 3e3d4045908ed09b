use std::borrow::Cow;

/// Postgres connection settings
#[derive(Debug, Clone)]
pub struct DbConfig<'a> {
    pub host: Cow<'a, str>,
    pub port: u16,
    pub database: Cow<'a, str>,
    pub user: Cow<'a, str>,
    pub password: Cow<'a, str>,
    /// Full DSN; takes precedence over the individual parts.
    pub url: Option<Cow<'a, str>>,
    pub max_connections: u32,
}

impl<'a> DbConfig<'a> {
    pub fn new(
        host: impl Into<Cow<'a, str>>,
        port: u16,
        database: impl Into<Cow<'a, str>>,
        user: impl Into<Cow<'a, str>>,
        password: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            user: user.into(),
            password: password.into(),
            url: None,
            max_connections: 10,
        }
    }

    pub fn with_url(mut self, url: impl Into<Cow<'a, str>>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Connection string, borrowed when an explicit DSN was given
    pub fn connection_string(&self) -> Cow<'_, str> {
        match &self.url {
            Some(url) => Cow::Borrowed(url.as_ref()),
            None => Cow::Owned(format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            )),
        }
    }

    /// Read `DATABASE_URL`, falling back to the `DB_*` variables.
    pub fn from_env() -> Result<DbConfig<'static>, String> {
        let host = std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("DB_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .map_err(|_| "Invalid DB_PORT")?;
        let database = std::env::var("DB_NAME").unwrap_or_else(|_| "careloop".to_string());
        let user = std::env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
        let password = std::env::var("DB_PASSWORD").unwrap_or_else(|_| "postgres".to_string());
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| "Invalid DB_MAX_CONNECTIONS")?;

        let mut config = DbConfig::new(host, port, database, user, password)
            .with_max_connections(max_connections);
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config = config.with_url(url);
        }
        Ok(config)
    }
}

impl<'a> Default for DbConfig<'a> {
    fn default() -> Self {
        Self {
            host: Cow::Borrowed("localhost"),
            port: 5432,
            database: Cow::Borrowed("careloop"),
            user: Cow::Borrowed("postgres"),
            password: Cow::Borrowed("postgres"),
            url: None,
            max_connections: 10,
        }
    }
}
