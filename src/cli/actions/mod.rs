pub mod gateway;
pub mod server;

use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    Backend(server::Args),
    Gateway(gateway::Args),
}

impl Action {
    /// Execute the action.
    ///
    /// # Errors
    /// Returns an error if the selected service fails to start.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Backend(args) => server::execute(args).await,
            Self::Gateway(args) => gateway::execute(args).await,
        }
    }
}
