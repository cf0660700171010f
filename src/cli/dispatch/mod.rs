use crate::auth::activation::ActivationMode;
use crate::cli::actions::{gateway, server, Action};
use anyhow::Result;
use axum::http::Method;
use url::Url;

/// Turn backend CLI matches into an [`Action`].
///
/// # Errors
/// Returns an error when a required argument is missing.
pub fn backend(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Backend(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        token_ttl_millis: matches
            .get_one::<i64>("token-ttl-millis")
            .copied()
            .unwrap_or(28_800_000),
        key_rotation_millis: matches
            .get_one::<i64>("key-rotation-millis")
            .copied()
            .unwrap_or(86_400_000),
        activation_mode: matches
            .get_one::<ActivationMode>("activation-mode")
            .copied()
            .unwrap_or(ActivationMode::Test),
    }))
}

/// Turn gateway CLI matches into an [`Action`].
///
/// # Errors
/// Returns an error when a required argument is missing or unparseable.
pub fn gateway(matches: &clap::ArgMatches) -> Result<Action> {
    let backend_url = matches
        .get_one::<Url>("backend-url")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --backend-url"))?;

    let allowed_origins = matches
        .get_one::<String>("allowed-origins")
        .map(|origins| {
            origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let allowed_methods = matches
        .get_one::<String>("allowed-methods")
        .map(|methods| {
            methods
                .split(',')
                .map(str::trim)
                .filter(|method| !method.is_empty())
                .filter_map(|method| Method::from_bytes(method.to_uppercase().as_bytes()).ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(Action::Gateway(gateway::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8081),
        backend_url,
        max_sessions: matches
            .get_one::<u64>("max-sessions")
            .copied()
            .unwrap_or(2)
            .try_into()
            .unwrap_or(2),
        session_cookie_name: matches
            .get_one::<String>("session-cookie-name")
            .cloned()
            .unwrap_or_default(),
        session_cookie_secure: matches
            .get_one::<bool>("session-cookie-secure")
            .copied()
            .unwrap_or(false),
        session_idle_seconds: matches
            .get_one::<u64>("session-idle-seconds")
            .copied()
            .unwrap_or(1800),
        allowed_origins,
        allowed_methods,
    }))
}

#[cfg(test)]
mod tests {
    use super::{backend, gateway};
    use crate::auth::activation::ActivationMode;
    use crate::cli::actions::Action;
    use crate::cli::commands;
    use anyhow::Result;
    use axum::http::Method;

    #[test]
    fn backend_dispatch_builds_args() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "gardisto",
            "--dsn",
            "postgres://localhost/gardisto",
            "--activation-mode",
            "none",
            "--token-ttl-millis",
            "1000",
        ]);
        let Action::Backend(args) = backend(&matches)? else {
            anyhow::bail!("expected backend action");
        };
        assert_eq!(args.port, 8080);
        assert_eq!(args.dsn, "postgres://localhost/gardisto");
        assert_eq!(args.token_ttl_millis, 1000);
        assert_eq!(args.key_rotation_millis, 86_400_000);
        assert_eq!(args.activation_mode, ActivationMode::None);
        Ok(())
    }

    #[test]
    fn gateway_dispatch_parses_lists() -> Result<()> {
        let matches = commands::gateway::new().get_matches_from(vec![
            "gardisto-gateway",
            "--allowed-origins",
            "https://app.example, https://admin.example",
            "--allowed-methods",
            "get,post",
        ]);
        let Action::Gateway(args) = gateway(&matches)? else {
            anyhow::bail!("expected gateway action");
        };
        assert_eq!(args.port, 8081);
        assert_eq!(args.backend_url.as_str(), "http://localhost:8080/");
        assert_eq!(args.max_sessions, 2);
        assert_eq!(
            args.allowed_origins,
            vec![
                "https://app.example".to_string(),
                "https://admin.example".to_string()
            ]
        );
        assert_eq!(args.allowed_methods, vec![Method::GET, Method::POST]);
        Ok(())
    }
}
