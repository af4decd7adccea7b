use async_trait::async_trait;
use confdock_lib::common::{Cancelled, Prompter};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};
use tracing::debug;

/// Terminal prompts. Each prompt blocks, so it runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> dialoguer::Result<Option<T>> + Send + 'static,
) -> Result<T, Cancelled> {
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(Some(value))) => Ok(value),
        Ok(Ok(None)) => Err(Cancelled),
        Ok(Err(e)) => {
            debug!(error = %e, "prompt aborted");
            Err(Cancelled)
        }
        Err(e) => {
            debug!(error = %e, "prompt task failed");
            Err(Cancelled)
        }
    }
}

#[async_trait]
impl Prompter for DialoguerPrompter {
    async fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, Cancelled> {
        let prompt = prompt.to_string();
        let default = default.map(str::to_string);
        blocking(move || {
            let theme = ColorfulTheme::default();
            let mut input = Input::<String>::with_theme(&theme)
                .with_prompt(prompt)
                .allow_empty(true);
            if let Some(default) = default {
                input = input.default(default);
            }
            input.interact_text().map(Some)
        })
        .await
    }

    async fn password(&self, prompt: &str) -> Result<String, Cancelled> {
        let prompt = prompt.to_string();
        blocking(move || {
            Password::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .allow_empty_password(true)
                .interact()
                .map(Some)
        })
        .await
    }

    async fn select(&self, prompt: &str, items: &[String]) -> Result<usize, Cancelled> {
        let prompt = prompt.to_string();
        let items = items.to_vec();
        blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await
    }
}
