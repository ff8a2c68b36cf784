//! Pipeline configuration.
//!
//! Built once at startup and shared read-only by every request. Nothing in the
//! pipeline consults process-global state after this point.

use std::env;

/// Environment variable holding the deployment profile.
pub const PROFILE_ENV: &str = "profile";

/// The profile value that selects [`Profile::Production`].
pub const PRODUCTION_PROFILE: &str = "product";

/// Deployment profile. Controls how much internal detail reaches clients.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Profile {
    #[default]
    Development,
    Production,
}

impl Profile {
    pub fn from_value(value: &str) -> Self {
        if value == PRODUCTION_PROFILE { Self::Production } else { Self::Development }
    }

    /// Reads [`PROFILE_ENV`]; unset or unknown values mean development.
    pub fn from_env() -> Self {
        env::var(PROFILE_ENV).map_or(Self::Development, |v| Self::from_value(&v))
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Path substrings that classify a request into an access tier.
#[derive(Clone, Debug)]
pub struct TierPatterns {
    pub share: String,
    pub api: String,
    pub private: String,
    pub public: String,
}

impl Default for TierPatterns {
    fn default() -> Self {
        Self {
            share: "/share/".to_owned(),
            api: "/api/".to_owned(),
            private: "/private/".to_owned(),
            public: "/public/".to_owned(),
        }
    }
}

/// Names of the headers (and, for tokens, query keys) the context reads.
#[derive(Clone, Debug)]
pub struct HeaderNames {
    pub trace_id: String,
    pub token: String,
    pub share_token: String,
    pub platform: String,
    pub private_uid: String,
    pub profile: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            trace_id: "trace-id".to_owned(),
            token: "token".to_owned(),
            share_token: "shareToken".to_owned(),
            platform: "platform".to_owned(),
            private_uid: "private-uid".to_owned(),
            profile: "profile".to_owned(),
        }
    }
}

/// Immutable pipeline configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub profile: Profile,
    pub tiers: TierPatterns,
    pub headers: HeaderNames,
    pub health_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Profile::Development,
            tiers: TierPatterns::default(),
            headers: HeaderNames::default(),
            health_path: "/health".to_owned(),
        }
    }
}

impl Config {
    /// Defaults, with the profile taken from the environment.
    pub fn from_env() -> Self {
        Self { profile: Profile::from_env(), ..Self::default() }
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn tiers(mut self, tiers: TierPatterns) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn headers(mut self, headers: HeaderNames) -> Self {
        self.headers = headers;
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_product_is_production() {
        assert_eq!(Profile::from_value("product"), Profile::Production);
        assert_eq!(Profile::from_value("prod"), Profile::Development);
        assert_eq!(Profile::from_value(""), Profile::Development);
    }

    #[test]
    fn setters_override_defaults() {
        let cfg = Config::default().profile(Profile::Production).health_path("/ping");
        assert!(cfg.profile.is_production());
        assert_eq!(cfg.health_path, "/ping");
        assert_eq!(cfg.tiers.api, "/api/");
    }
}
