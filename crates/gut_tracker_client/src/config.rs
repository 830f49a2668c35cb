use crate::RepositoryError;
use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_token: SecretString,
    pub base_url: String,
    pub page_size: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, RepositoryError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, RepositoryError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let token = get("GUT_TRACKER_API_TOKEN")
            .ok_or_else(|| RepositoryError::Config("GUT_TRACKER_API_TOKEN missing".into()))?;
        let base_url = get("GUT_TRACKER_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let page_size = match get("GUT_TRACKER_PAGE_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(RepositoryError::Config(format!(
                        "GUT_TRACKER_PAGE_SIZE must be a positive integer, got {raw:?}"
                    )));
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };
        Ok(Self {
            api_token: SecretString::new(token.into()),
            base_url,
            page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_missing_token() {
        let get = |k: &str| match k {
            "GUT_TRACKER_BASE_URL" => Some("http://localhost".into()),
            _ => None,
        };
        let res = Config::from_env_with(get);
        assert!(matches!(res, Err(RepositoryError::Config(_))));
    }

    #[test]
    fn from_env_reads_values() {
        let get = |k: &str| match k {
            "GUT_TRACKER_API_TOKEN" => Some("sekrit".into()),
            "GUT_TRACKER_BASE_URL" => Some("http://localhost".into()),
            "GUT_TRACKER_PAGE_SIZE" => Some("25".into()),
            _ => None,
        };
        let cfg = Config::from_env_with(get).expect("cfg");
        assert_eq!(cfg.base_url, "http://localhost");
        assert_eq!(cfg.page_size, 25);
    }

    #[test]
    fn from_env_defaults_and_rejects_zero_page() {
        let cfg = Config::from_env_with(|k| (k == "GUT_TRACKER_API_TOKEN").then(|| "t".into()))
            .expect("cfg");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);

        let res = Config::from_env_with(|k| match k {
            "GUT_TRACKER_API_TOKEN" => Some("t".into()),
            "GUT_TRACKER_PAGE_SIZE" => Some("0".into()),
            _ => None,
        });
        assert!(res.is_err());
    }
}
