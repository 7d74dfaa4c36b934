pub mod serve;
pub mod signup;

// Keeps the match over actions out of this file.
mod run;

#[derive(Debug)]
pub enum Action {
    Serve(serve::Args),
    Signup(signup::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
