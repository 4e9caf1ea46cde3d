use std::sync::Mutex;

use gatehouse_core::SmsClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub recipient: String,
    pub body: String,
}

/// Recording SMS client for development and tests.
#[derive(Debug, Default)]
pub struct MockSmsClient {
    sent: Mutex<Vec<SentSms>>,
}

impl MockSmsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().expect("sms mock lock").clone()
    }
}

#[async_trait::async_trait]
impl SmsClient for MockSmsClient {
    async fn send_sms(&self, recipient: &str, body: &str) -> Result<(), String> {
        self.sent.lock().expect("sms mock lock").push(SentSms {
            recipient: recipient.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
