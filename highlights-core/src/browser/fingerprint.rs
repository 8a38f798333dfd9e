use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;

use crate::config::StealthSection;

use super::error::{BrowserError, BrowserResult};

/// Scripts injected before any page script runs, hiding the most common
/// automation tells.
#[derive(Debug, Clone)]
pub struct StealthMasker {
    config: StealthSection,
}

impl StealthMasker {
    pub fn new(config: StealthSection) -> Self {
        Self { config }
    }

    pub fn scripts(&self) -> Vec<String> {
        let mut scripts = Vec::new();
        if self.config.hide_webdriver {
            scripts.push(
                "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });"
                    .to_string(),
            );
        }
        if !self.config.languages.is_empty() {
            let list = self
                .config
                .languages
                .iter()
                .map(|lang| format!("'{}'", escape_js(lang)))
                .collect::<Vec<_>>()
                .join(", ");
            scripts.push(format!(
                "Object.defineProperty(navigator, 'languages', {{ get: () => [{list}] }});"
            ));
        }
        if self.config.chrome_runtime_stub {
            scripts.push("window.chrome = window.chrome || { runtime: {} };".to_string());
        }
        scripts
    }

    pub async fn apply(&self, page: &Page) -> BrowserResult<()> {
        for script in self.scripts() {
            page.evaluate_on_new_document(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(script)
                    .build()
                    .map_err(BrowserError::Configuration)?,
            )
            .await?;
        }
        Ok(())
    }
}

fn escape_js(input: &str) -> String {
    input.replace('\\', "\\\\").replace('\'', "\\'")
}
