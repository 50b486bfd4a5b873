pub mod provision;
pub mod server;

// The match over actions lives in run.rs so this file only declares them.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Provision(provision::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
