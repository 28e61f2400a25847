use std::time::Duration;

use gha_oidc::{Disposition, Error, Policy, Verifier, VerifierConfig, VerifyToken};
use tracing_subscriber::EnvFilter;

const POLICY: &str = r#"{
    "default_deny": true,
    "rules": [
        {
            "name": "block-forks",
            "effect": "deny",
            "conditions": { "event_name": ["pull_request_target"] }
        },
        {
            "name": "deploy-from-main",
            "effect": "allow",
            "conditions": {
                "repository": ["myorg/*"],
                "ref": ["refs/heads/main", "refs/tags/v*"],
                "environment": ["production"]
            }
        },
        {
            "name": "ci-everywhere",
            "effect": "allow",
            "conditions": {
                "repository_owner": ["myorg"],
                "workflow": ["CI"]
            }
        }
    ]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gha_oidc=debug")),
        )
        .init();

    // A token requested inside a workflow run via ACTIONS_ID_TOKEN_REQUEST_URL
    let token = std::env::args()
        .nth(1)
        .ok_or("usage: basic_usage <token> [audience]")?;
    let audience = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "https://github.com/myorg".to_string());

    let config = VerifierConfig::new()
        .with_audience(audience)
        .with_cache_ttl(Duration::from_secs(30 * 60))
        .with_policy(Policy::from_json(POLICY)?);
    let verifier = Verifier::new(config)?;

    match verifier.verify(&token).await {
        Ok(result) => {
            println!("Token accepted ({})", result.decision.reason);
            println!("  Repository: {}", result.claims.repository);
            println!("  Ref:        {}", result.claims.git_ref);
            println!("  Workflow:   {}", result.claims.workflow);
            println!("  Actor:      {}", result.claims.actor);
            if let Some(environment) = result.claims.environment() {
                println!("  Environment: {environment}");
            }
        }
        Err(Error::AccessDenied {
            matched_rule,
            reason,
        }) => {
            let rule = matched_rule.as_deref().unwrap_or("<none>");
            eprintln!("Access denied (rule {rule}): {reason}");
        }
        Err(error) => match error.disposition() {
            Disposition::RetryLater => eprintln!("GitHub keys unavailable, retry later: {error}"),
            Disposition::Reconfigure => eprintln!("Verifier misconfigured: {error}"),
            Disposition::Reject => {
                eprintln!("Token rejected [{}]: {error}", error.kind().as_str())
            }
        },
    }

    Ok(())
}
