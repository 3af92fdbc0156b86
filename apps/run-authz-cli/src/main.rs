//! `run-authz`: evaluate one run authorization request against the static
//! collaborators and print the outcome as JSON.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use run_authz::config::CONFIG_KEY;
use run_authz::{Collaborators, RunAuthz, RunAuthzConfig};
use run_authz_sdk::{
    AuthorizationMode, AuthorizationRequest, CallContext, ServiceFilter, SubjectType, Targeting,
};
use serde_json::json;
use static_run_authz_plugin::{StaticRunAuthzPlugin, StaticRunAuthzPluginConfig};
use tracing_subscriber::EnvFilter;

/// Config file section read by the static plugin.
const PLUGIN_KEY: &str = "static_plugin";

#[derive(Debug, Parser)]
#[command(
    name = "run-authz",
    version,
    about = "Show which services' runs a subject may read"
)]
struct Cli {
    /// YAML file with `run_authz` and `static_plugin` sections. A missing
    /// file means built-in defaults.
    #[arg(short, long, default_value = "run-authz.yaml")]
    config: PathBuf,

    #[arg(long)]
    subject: String,

    #[arg(long)]
    tenant: String,

    /// Defaults to the configured `required_permission`.
    #[arg(long)]
    permission: Option<String>,

    /// Check the subject as a service account instead of a user.
    #[arg(long)]
    service_account: bool,

    /// Apply this mode to every tenant, ignoring configured targeting.
    #[arg(long)]
    mode: Option<AuthorizationMode>,

    /// Also report whether this service is admitted.
    #[arg(long)]
    service: Option<String>,

    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let figment = RunAuthzConfig::figment(&cli.config);
    let mut cfg = RunAuthzConfig::from_figment(&figment, CONFIG_KEY)
        .with_context(|| format!("loading {CONFIG_KEY} section of {}", cli.config.display()))?;
    if let Some(mode) = cli.mode {
        cfg.mode = mode;
        cfg.targeting = Targeting::Static;
    }
    let plugin_cfg: StaticRunAuthzPluginConfig = if figment.contains(PLUGIN_KEY) {
        figment
            .extract_inner(PLUGIN_KEY)
            .with_context(|| format!("loading {PLUGIN_KEY} section"))?
    } else {
        StaticRunAuthzPluginConfig::default()
    };

    let mut request = AuthorizationRequest::new(
        cli.subject,
        cli.tenant,
        cli.permission
            .unwrap_or_else(|| cfg.required_permission.clone()),
    );
    if cli.service_account {
        request = request.with_subject_type(SubjectType::ServiceAccount);
    }

    let plugin = StaticRunAuthzPlugin::init(plugin_cfg);
    let authz = RunAuthz::init(
        cfg,
        Collaborators {
            permissions: plugin.permissions(),
            workspaces: plugin.workspaces(),
            checks: plugin.checks(),
            policy_source: None,
            event_sink: None,
        },
    )?;

    let ctx = CallContext::builder()
        .request_id(uuid::Uuid::new_v4().to_string())
        .timeout(cli.timeout)
        .build();
    let report = evaluate(&authz, &ctx, &request, cli.service.as_deref()).await;
    authz.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&report?)?);
    Ok(())
}

async fn evaluate(
    authz: &RunAuthz,
    ctx: &CallContext,
    request: &AuthorizationRequest,
    service: Option<&str>,
) -> anyhow::Result<serde_json::Value> {
    let outcome = authz.client().authorize(ctx, request).await?;
    let filter = ServiceFilter::from_decision(&outcome.decision);

    let service_access = service.map(|service| {
        json!({
            "service": service,
            "allowed": outcome.decision.admits(service, authz.engine().catalog()),
        })
    });

    Ok(json!({
        "request_id": ctx.request_id(),
        "deny_all": filter.is_deny_all(),
        "constraint": filter.to_constraint(),
        "service_access": service_access,
        "outcome": outcome,
    }))
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
