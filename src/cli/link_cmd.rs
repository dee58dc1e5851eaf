//! Link CLI command

use anyhow::{Context, Result};

use super::output::Output;
use crate::domain::Environment;
use crate::storage::{LinkBuilder, Project};

pub fn run(output: &Output, target: &str, anchor: Option<&str>, env: Option<&str>) -> Result<()> {
    let project = Project::open_current()?;
    let config = project.config();

    let environment = match env {
        Some(name) => name.parse::<Environment>().map_err(|e| anyhow::anyhow!(e))?,
        None => config.effective_environment()?,
    };
    output.verbose_ctx("link", &format!("Environment: {}", environment));

    let routes = config.route_map_for(environment);
    let store = project.registry_store();
    let href = LinkBuilder::new(&routes, &store)
        .build_link(target, anchor)
        .with_context(|| format!("Cannot link to {}", target))?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "target": target,
            "anchor": anchor,
            "environment": environment,
            "href": href,
        }));
    } else {
        println!("{}", href);
    }

    Ok(())
}
