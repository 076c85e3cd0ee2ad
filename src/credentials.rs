//! Access credentials used to sign requests

use std::fmt;

/// Access/secret key pair, optionally carrying delegated-access tokens
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
    user_token: Option<String>,
    product_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            user_token: None,
            product_token: None,
        }
    }

    /// Attach delegated tokens; requests then carry an `x-amz-security-token` header
    pub fn with_delegated_tokens(
        mut self,
        user_token: impl Into<String>,
        product_token: Option<String>,
    ) -> Self {
        self.user_token = Some(user_token.into());
        self.product_token = product_token;
        self
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn is_delegated(&self) -> bool {
        self.user_token.is_some()
    }

    /// Value of the `x-amz-security-token` header: `user,product`, `user`, or none
    pub fn security_token(&self) -> Option<String> {
        match (&self.user_token, &self.product_token) {
            (Some(user), Some(product)) => Some(format!("{},{}", user, product)),
            (Some(user), None) => Some(user.clone()),
            (None, _) => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("user_token", &self.user_token.as_ref().map(|_| "<redacted>"))
            .field("product_token", &self.product_token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_credentials_have_no_token() {
        let creds = Credentials::new("AKID", "secret");
        assert_eq!(creds.access_key(), "AKID");
        assert_eq!(creds.secret_key(), "secret");
        assert!(!creds.is_delegated());
        assert_eq!(creds.security_token(), None);
    }

    #[test]
    fn test_security_token_forms() {
        let user_only = Credentials::new("AKID", "secret").with_delegated_tokens("user-tok", None);
        assert_eq!(user_only.security_token().as_deref(), Some("user-tok"));

        let both = Credentials::new("AKID", "secret")
            .with_delegated_tokens("user-tok", Some("product-tok".to_string()));
        assert_eq!(both.security_token().as_deref(), Some("user-tok,product-tok"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("AKID", "very-secret");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("very-secret"));
    }
}
