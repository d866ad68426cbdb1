use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity and API key are both required")]
    MissingCredentials,

    #[error("An account already exists for {0}")]
    DuplicateIdentity(String),

    /// The probe call with the candidate key failed (rejected or unreachable).
    #[error("The catalog service did not accept this API key: {0}")]
    InvalidExternalCredential(#[source] ApiError),

    #[error("Invalid identity or API key")]
    InvalidCredential,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// Short message suitable for showing next to a sign-in form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::MissingCredentials => "Enter both an identity and an API key.".to_string(),
            AuthError::DuplicateIdentity(identity) => {
                format!("{} is already registered. Sign in instead.", identity)
            }
            AuthError::InvalidExternalCredential(ApiError::Unauthorized) => {
                "That API key was rejected by the catalog service.".to_string()
            }
            AuthError::InvalidExternalCredential(e) if e.is_transient() => {
                "Could not reach the catalog service to check the API key. Try again.".to_string()
            }
            AuthError::InvalidExternalCredential(_) => {
                "That API key could not be verified.".to_string()
            }
            AuthError::InvalidCredential => "Identity or API key is incorrect.".to_string(),
            AuthError::Storage(e) => format!("Could not save your session: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_distinguish_causes() {
        let duplicate = AuthError::DuplicateIdentity("a@x.com".into()).user_message();
        let rejected = AuthError::InvalidExternalCredential(ApiError::Unauthorized).user_message();
        let wrong = AuthError::InvalidCredential.user_message();

        assert!(duplicate.contains("a@x.com"));
        assert_ne!(duplicate, rejected);
        assert_ne!(rejected, wrong);
    }
}
