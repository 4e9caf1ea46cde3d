mod mock_sms_client;

pub use mock_sms_client::{MockSmsClient, SentSms};
