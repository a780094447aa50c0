//! Configuration types for the S3 client

use super::error::{S3Error, S3Result};
use serde::{Deserialize, Serialize};

/// S3 client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,

    /// AWS region used for signing and default endpoint resolution
    pub region: String,

    /// Custom endpoint URL (for S3-compatible services like MinIO)
    pub endpoint: Option<String>,

    /// Access key ID; requests are sent unsigned when absent
    pub access_key: Option<String>,

    /// Secret access key
    pub secret_key: Option<String>,

    /// Session token (for temporary credentials)
    pub session_token: Option<String>,

    /// Path-style addressing (required for most S3-compatible services)
    pub force_path_style: bool,

    /// Part size for streaming multipart uploads
    pub part_size: usize,

    /// Number of concurrent part uploads
    pub concurrency: usize,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl S3Config {
    /// Create a new S3 config with required parameters
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: super::DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            session_token: None,
            force_path_style: false,
            part_size: super::MIN_PART_SIZE,
            concurrency: super::DEFAULT_CONCURRENCY,
            timeout_seconds: 300,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> S3Result<()> {
        if self.bucket.is_empty() {
            return Err(S3Error::InvalidConfig(
                "Bucket name cannot be empty".to_string(),
            ));
        }

        if !is_valid_bucket_name(&self.bucket) {
            return Err(S3Error::InvalidConfig(format!(
                "Invalid bucket name: {}. Bucket names must be 3-63 characters, \
                 lowercase letters, numbers, hyphens, and periods only",
                self.bucket
            )));
        }

        if self.region.is_empty() {
            return Err(S3Error::InvalidConfig("Region cannot be empty".to_string()));
        }

        if self.part_size < super::MIN_PART_SIZE {
            return Err(S3Error::InvalidConfig(format!(
                "Part size {} is below minimum {}",
                self.part_size,
                super::MIN_PART_SIZE
            )));
        }

        if self.part_size as u64 > super::MAX_PART_SIZE {
            return Err(S3Error::InvalidConfig(format!(
                "Part size {} exceeds maximum {}",
                self.part_size,
                super::MAX_PART_SIZE
            )));
        }

        if self.concurrency == 0 || self.concurrency > super::MAX_CONCURRENCY {
            return Err(S3Error::InvalidConfig(format!(
                "Concurrency must be between 1 and {}, got {}",
                super::MAX_CONCURRENCY,
                self.concurrency
            )));
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(S3Error::InvalidConfig(
                "Both access_key and secret_key must be provided together".to_string(),
            ));
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                S3Error::InvalidConfig(format!("Invalid endpoint {}: {}", endpoint, e))
            })?;
        }

        Ok(())
    }

    /// Endpoint to address: the configured one, or the AWS regional endpoint
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }

    /// Access key and secret key, when both are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self::new("")
    }
}

/// Builder for S3Config
pub struct S3ConfigBuilder {
    config: S3Config,
}

impl S3ConfigBuilder {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            config: S3Config::new(bucket),
        }
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    /// Set custom endpoint (for MinIO, LocalStack, etc.)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config.access_key = Some(access_key.into());
        self.config.secret_key = Some(secret_key.into());
        self
    }

    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.config.session_token = Some(token.into());
        self
    }

    pub fn force_path_style(mut self, force: bool) -> Self {
        self.config.force_path_style = force;
        self
    }

    pub fn part_size(mut self, size: usize) -> Self {
        self.config.part_size = size;
        self
    }

    pub fn concurrency(mut self, count: usize) -> Self {
        self.config.concurrency = count;
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }

    /// Build the configuration
    pub fn build(self) -> S3Result<S3Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Validate S3 bucket name according to AWS rules
fn is_valid_bucket_name(name: &str) -> bool {
    if name.len() < 3 || name.len() > 63 {
        return false;
    }

    let bytes = name.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }

    if name.contains("..") {
        return false;
    }

    // Must not look like an IPv4 address
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = S3Config::new("my-bucket");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.part_size, 5 * 1024 * 1024);
        assert_eq!(config.concurrency, 4);
        assert!(config.credentials().is_none());
        assert_eq!(config.endpoint_url(), "https://s3.us-east-1.amazonaws.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bucket_name_rules() {
        assert!(is_valid_bucket_name("my-bucket"));
        assert!(is_valid_bucket_name("logs.example.com"));
        assert!(is_valid_bucket_name("abc"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("My-Bucket"));
        assert!(!is_valid_bucket_name("-bucket"));
        assert!(!is_valid_bucket_name("bucket-"));
        assert!(!is_valid_bucket_name("my..bucket"));
        assert!(!is_valid_bucket_name("192.168.1.1"));
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
    }

    #[test]
    fn test_validate_rejects_small_part_size() {
        let mut config = S3Config::new("my-bucket");
        config.part_size = 1024 * 1024;
        assert!(matches!(config.validate(), Err(S3Error::InvalidConfig(_))));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_validate_rejects_oversized_part_size() {
        let mut config = S3Config::new("my-bucket");
        config.part_size = crate::s3::MAX_PART_SIZE as usize;
        assert!(config.validate().is_ok());

        config.part_size += 1;
        assert!(matches!(config.validate(), Err(S3Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = S3Config::new("my-bucket");
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_paired_credentials() {
        let mut config = S3Config::new("my-bucket");
        config.access_key = Some("AKIDEXAMPLE".to_string());
        assert!(config.validate().is_err());

        config.secret_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = S3Config::new("my-bucket");
        config.endpoint = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = S3ConfigBuilder::new("my-bucket")
            .region("eu-west-1")
            .endpoint("http://localhost:9000")
            .credentials("minioadmin", "minioadmin")
            .force_path_style(true)
            .part_size(8 * 1024 * 1024)
            .concurrency(8)
            .build()
            .unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url(), "http://localhost:9000");
        assert_eq!(config.credentials(), Some(("minioadmin", "minioadmin")));
        assert!(config.force_path_style);
        assert_eq!(config.part_size, 8 * 1024 * 1024);
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_builder_validates() {
        assert!(S3ConfigBuilder::new("").build().is_err());
    }
}
