use async_trait::async_trait;

use crate::email::{EmailError, EmailMessage, SendEmail};

/// Stand-in sender used when outbound email is disabled. Messages are logged
/// instead of dispatched.
#[derive(Default)]
pub struct MockSender {}

impl MockSender {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl SendEmail for MockSender {
    async fn send<'a>(&self, message: EmailMessage<'a>) -> Result<(), EmailError> {
        log::info!("Email dispatch is disabled. Message:\n{:#?}", message);
        Ok(())
    }
}
