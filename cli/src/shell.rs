//! Interactive menu: select a year, search, show statistics.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::app::App;
use crate::render::{format_outcome, format_stats};

const MENU: &str = "\nTender search is live. Start by selecting a fiscal year, then search or see stats
1. Select fiscal year (e.g., 2024-2025)
2. Search tenders
3. Show statistics
4. Exit";

struct Prompter<'a, R, W> {
    lines: Lines<R>,
    out: &'a mut W,
}

impl<R, W> Prompter<'_, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Print `message` and read one trimmed line; `None` at end of input.
    async fn ask(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.out, "{message}")?;
        self.out.flush()?;
        Ok(self
            .lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    fn say(&mut self, message: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", message.as_ref())?;
        Ok(())
    }
}

/// Parse an optional numeric answer; empty input means "use the default".
fn parse_or_default<T: std::str::FromStr>(answer: &str, default: T) -> Option<T> {
    if answer.is_empty() {
        Some(default)
    } else {
        answer.parse().ok()
    }
}

/// Run the menu loop until the user exits or input ends.
pub async fn run<R, W>(app: &App, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut prompt = Prompter {
        lines: input.lines(),
        out,
    };
    let defaults = app.config().query.clone();

    loop {
        prompt.say(MENU)?;
        let Some(choice) = prompt.ask("\nEnter your choice (1-4): ").await? else {
            break;
        };

        match choice.as_str() {
            "1" => {
                let Some(year) = prompt.ask("Enter fiscal year (e.g., 2024-2025): ").await? else {
                    break;
                };
                match app.select_year(&year, false).await {
                    Ok(engine) => {
                        prompt.say(format!("\nSwitched to fiscal year: {}", engine.year()))?;
                        let (_, stats) = app.stats(chrono::Local::now().naive_local()).await?;
                        prompt.say(format!("Total tenders: {}", stats.total))?;
                        prompt.say(format!("Future deadlines: {}", stats.future_dates))?;
                    }
                    Err(e) => prompt.say(format!("Error: {e:#}"))?,
                }
            }
            "2" => {
                if app.session().current().await.is_none() {
                    prompt.say("Please select a fiscal year first")?;
                    continue;
                }
                let Some(query) = prompt.ask("Enter search term: ").await? else {
                    break;
                };
                let Some(top_k) = prompt
                    .ask(&format!("Number of results to show (default {}): ", defaults.top_k))
                    .await?
                else {
                    break;
                };
                let Some(threshold) = prompt
                    .ask(&format!(
                        "Minimum similarity score 0-1 (default {}): ",
                        defaults.threshold
                    ))
                    .await?
                else {
                    break;
                };

                let (Some(top_k), Some(threshold)) = (
                    parse_or_default(&top_k, defaults.top_k),
                    parse_or_default(&threshold, defaults.threshold),
                ) else {
                    prompt.say("Invalid number. Please try again.")?;
                    continue;
                };

                match app.search(&query, Some(threshold), Some(top_k)).await {
                    Ok(outcome) => prompt.say(format!("\n{}", format_outcome(&outcome)))?,
                    Err(e) => prompt.say(format!("Error: {e:#}"))?,
                }
            }
            "3" => match app.stats(chrono::Local::now().naive_local()).await {
                Ok((year, stats)) => prompt.say(format!("\n{}", format_stats(&year, &stats)))?,
                Err(_) => prompt.say("Please select a fiscal year first")?,
            },
            "4" => {
                prompt.say("Goodbye!")?;
                break;
            }
            _ => prompt.say("Invalid choice. Please try again.")?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tender_search::{EmbeddingConfig, SearchConfig};

    async fn app(dir: &TempDir) -> App {
        let config = SearchConfig::new(dir.path()).with_embedding(EmbeddingConfig::hashing());
        let feed = serde_json::json!({
            "data": [
                { "id": 1, "title": "Road works in Gulu", "procurement_type": "Works",
                  "financial_year": "2024-2025", "deadline": "2099-01-01" },
                { "id": 2, "title": "Supply of desks", "financial_year": "2024-2025",
                  "deadline": "soon" },
                { "id": 3, "title": "Old road", "financial_year": "2023-2024" }
            ]
        });
        std::fs::write(config.backup_path(), feed.to_string()).unwrap();
        App::new(config, true).await.unwrap()
    }

    async fn run_script(app: &App, script: &str) -> String {
        let mut out = Vec::new();
        run(app, script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_menu_flow() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let output = run_script(&app, "2\n1\n2024-2025\n2\nroad works\n\n-1\n3\n9\n4\n").await;

        assert!(output.contains("Please select a fiscal year first"));
        assert!(output.contains("Switched to fiscal year: 2024-2025"));
        assert!(output.contains("Total tenders: 2"));
        assert!(output.contains("Future deadlines: 1"));
        assert!(output.contains("Found 2 matches above threshold"));
        assert!(output.contains("Invalid/empty deadline dates: 1"));
        assert!(output.contains("Invalid choice. Please try again."));
        assert!(output.trim_end().ends_with("Goodbye!"));
    }

    #[tokio::test]
    async fn test_unknown_year_reports_error_and_continues() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let output = run_script(&app, "1\n1990-1991\n").await;

        assert!(output.contains("Error: no tenders found for financial year 1990-1991"));
        assert!(app.session().current().await.is_none());
    }

    #[tokio::test]
    async fn test_bad_number_is_rejected() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir).await;

        let output = run_script(&app, "1\n2024-2025\n2\nroads\nmany\n\n4\n").await;
        assert!(output.contains("Invalid number. Please try again."));
    }
}
