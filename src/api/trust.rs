use super::TrustEvaluator;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Never flags anything
#[derive(Debug, Default, Clone)]
pub struct NoTrustSignal;

#[async_trait]
impl TrustEvaluator for NoTrustSignal {
    async fn is_compromised(&self, _token_address: &str) -> Result<bool, ServiceError> {
        Ok(false)
    }
}

/// Flags tokens from a configured deny list
#[derive(Debug, Default, Clone)]
pub struct DenyListTrust {
    denied: HashSet<String>,
}

impl DenyListTrust {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            denied: tokens.into_iter().collect(),
        }
    }
}

#[async_trait]
impl TrustEvaluator for DenyListTrust {
    async fn is_compromised(&self, token_address: &str) -> Result<bool, ServiceError> {
        Ok(self.denied.contains(token_address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deny_list() {
        let trust = DenyListTrust::new(vec!["RUG".to_string()]);
        assert!(trust.is_compromised("RUG").await.unwrap());
        assert!(!trust.is_compromised("GOOD").await.unwrap());
        assert!(!NoTrustSignal.is_compromised("RUG").await.unwrap());
    }
}
