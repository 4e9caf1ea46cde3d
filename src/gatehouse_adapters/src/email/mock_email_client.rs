use std::sync::Mutex;

use gatehouse_core::EmailClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub content: String,
}

/// Recording email client for development and tests; the real transport is
/// an external collaborator.
#[derive(Debug, Default)]
pub struct MockEmailClient {
    sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("email mock lock").clone()
    }
}

#[async_trait::async_trait]
impl EmailClient for MockEmailClient {
    async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> Result<(), String> {
        self.sent.lock().expect("email mock lock").push(SentEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}
