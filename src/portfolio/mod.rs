use log::info;
use serde::{ Deserialize, Serialize };
use std::fs;
use thiserror::Error;

const EMBEDDED_PORTFOLIO: &str = include_str!("../../data/portfolio.json");

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("Portfolio file IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Portfolio JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOwner {
    pub name: String,
    pub title: String,
    pub bio: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioProject {
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub highlights: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub year: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSkills {
    pub frontend: Vec<String>,
    pub backend: Vec<String>,
    pub cloud: Vec<String>,
    pub integrations: Vec<String>,
    pub practices: Vec<String>,
}

impl PortfolioSkills {
    pub fn total(&self) -> usize {
        self.frontend.len() +
            self.backend.len() +
            self.cloud.len() +
            self.integrations.len() +
            self.practices.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContact {
    pub email: String,
    pub github: String,
    pub linkedin: String,
    pub cta: String,
}

/// Static knowledge base fed into the fallback system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioContext {
    pub owner: PortfolioOwner,
    pub projects: Vec<PortfolioProject>,
    pub skills: PortfolioSkills,
    pub contact: PortfolioContact,
    #[serde(default)]
    pub quick_facts: Vec<String>,
}

pub fn load_portfolio_context(path: Option<&str>) -> Result<PortfolioContext, PortfolioError> {
    let context: PortfolioContext = match path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| PortfolioError::Io {
                path: path.to_string(),
                source,
            })?;
            info!("Loading portfolio context from '{}'", path);
            serde_json::from_str(&raw)?
        }
        None => serde_json::from_str(EMBEDDED_PORTFOLIO)?,
    };
    Ok(context)
}

pub fn context_summary(context: &PortfolioContext) -> String {
    let names: Vec<&str> = context.projects
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    format!(
        "Owner: {} ({}), Projects: {} ({}), Skills: {} total, Quick Facts: {}",
        context.owner.name,
        context.owner.title,
        context.projects.len(),
        names.join(", "),
        context.skills.total(),
        context.quick_facts.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_portfolio_parses() {
        let ctx = load_portfolio_context(None).unwrap();
        assert!(!ctx.owner.name.is_empty());
        assert!(!ctx.projects.is_empty());
        assert!(ctx.projects.iter().any(|p| p.live_url.is_some()));
    }

    #[test]
    fn summary_lists_projects() {
        let ctx = load_portfolio_context(None).unwrap();
        let summary = context_summary(&ctx);
        assert!(summary.contains(&ctx.projects[0].name));
        assert!(summary.contains(&format!("Skills: {} total", ctx.skills.total())));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_portfolio_context(Some("/nonexistent/portfolio.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/portfolio.json"));
    }
}
