//! Health command handler.

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::context::Context;
use crate::health::{HealthChecker, HealthReport};

use super::App;

impl App {
    /// Print a health report; exits non-zero unless connected with APOC.
    pub async fn run_health(&self, context: &Context, json: bool) -> Result<()> {
        let report = match context.connect().await {
            Ok(conn) => HealthChecker::new(&conn).full_health_check().await,
            Err(e) => HealthReport {
                error: Some(e.to_string()),
                ..HealthReport::default()
            },
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        if report.is_healthy() {
            Ok(())
        } else {
            Err(eyre!("Neo4j is not healthy"))
        }
    }
}

fn print_report(report: &HealthReport) {
    let flag = |ok: bool| if ok { "yes" } else { "no" };
    println!("connected:      {}", flag(report.connected));
    println!("apoc available: {}", flag(report.apoc_available));
    if let Some(version) = &report.version {
        println!("version:        {}", version);
    }
    if let Some(stats) = &report.stats {
        println!("nodes:          {}", stats.node_count);
        println!("relationships:  {}", stats.relationship_count);
        println!("labels:         {}", stats.labels.join(", "));
    }
    if let Some(error) = &report.error {
        println!("error:          {}", error);
    }
}
