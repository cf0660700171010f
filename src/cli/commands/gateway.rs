use clap::{builder::ValueParser, Arg, ArgAction, ColorChoice, Command};
use url::Url;

use super::{styles, verbosity_arg};

pub fn validator_url() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<Url, String> {
        Url::parse(value).map_err(|err| format!("invalid URL: {err}"))
    })
}

/// The standard methods; extension methods never pass the firewall.
const KNOWN_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

/// Comma-separated HTTP methods; unknown names are fatal at startup.
pub fn validator_http_methods() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<String, String> {
        for method in value.split(',') {
            let method = method.trim().to_uppercase();
            if !KNOWN_METHODS.contains(&method.as_str()) {
                return Err(format!("invalid HTTP method: {method}"));
            }
        }
        Ok(value.to_string())
    })
}

pub fn new() -> Command {
    Command::new("gardisto-gateway")
        .about("Session gateway for the gardisto authentication service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles())
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8081")
                .env("GARDISTO_GATEWAY_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("backend-url")
                .short('b')
                .long("backend-url")
                .help("Base URL of the backend authentication service")
                .default_value("http://localhost:8080")
                .env("GARDISTO_BACKEND_URL")
                .value_parser(validator_url()),
        )
        .arg(
            Arg::new("max-sessions")
                .long("max-sessions")
                .help("Maximum concurrent sessions per account")
                .default_value("2")
                .env("GARDISTO_MAX_SESSIONS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("session-cookie-name")
                .long("session-cookie-name")
                .help("Custom session cookie name; always prefixed with __Host-")
                .default_value("GS")
                .env("GARDISTO_SESSION_COOKIE_NAME"),
        )
        .arg(
            Arg::new("session-cookie-secure")
                .long("session-cookie-secure")
                .help("Mark cookies Secure (enable when TLS terminates in front of the gateway)")
                .env("GARDISTO_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("session-idle-seconds")
                .long("session-idle-seconds")
                .help("Idle timeout after which a session expires")
                .default_value("1800")
                .env("GARDISTO_SESSION_IDLE_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("allowed-origins")
                .long("allowed-origins")
                .help("Comma-separated CORS origins, or * for any")
                .default_value("*")
                .env("GARDISTO_ALLOWED_ORIGINS"),
        )
        .arg(
            Arg::new("allowed-methods")
                .long("allowed-methods")
                .help("Comma-separated HTTP methods admitted by the gateway")
                .default_value("GET,POST,PUT,DELETE")
                .env("GARDISTO_ALLOWED_METHODS")
                .value_parser(validator_http_methods()),
        )
        .arg(verbosity_arg("GARDISTO_GATEWAY_LOG_LEVEL"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "gardisto-gateway");
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_defaults() {
        let command = new();
        let matches = command.get_matches_from(vec!["gardisto-gateway"]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(8081));
        assert_eq!(
            matches.get_one::<Url>("backend-url").map(Url::as_str),
            Some("http://localhost:8080/")
        );
        assert_eq!(matches.get_one::<u64>("max-sessions").copied(), Some(2));
        assert_eq!(
            matches
                .get_one::<String>("session-cookie-name")
                .map(String::as_str),
            Some("GS")
        );
        assert_eq!(
            matches.get_one::<bool>("session-cookie-secure").copied(),
            Some(false)
        );
        assert_eq!(
            matches.get_one::<u64>("session-idle-seconds").copied(),
            Some(1800)
        );
        assert_eq!(
            matches
                .get_one::<String>("allowed-origins")
                .map(String::as_str),
            Some("*")
        );
        assert_eq!(
            matches
                .get_one::<String>("allowed-methods")
                .map(String::as_str),
            Some("GET,POST,PUT,DELETE")
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("GARDISTO_GATEWAY_PORT", Some("9443")),
                ("GARDISTO_BACKEND_URL", Some("https://backend.tld:8443")),
                ("GARDISTO_MAX_SESSIONS", Some("3")),
                ("GARDISTO_ALLOWED_METHODS", Some("GET,POST")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["gardisto-gateway"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(9443));
                assert_eq!(
                    matches.get_one::<Url>("backend-url").map(Url::as_str),
                    Some("https://backend.tld:8443/")
                );
                assert_eq!(matches.get_one::<u64>("max-sessions").copied(), Some(3));
                assert_eq!(
                    matches
                        .get_one::<String>("allowed-methods")
                        .map(String::as_str),
                    Some("GET,POST")
                );
            },
        );
    }

    #[test]
    fn test_invalid_backend_url_is_fatal() {
        let command = new();
        let result =
            command.try_get_matches_from(vec!["gardisto-gateway", "--backend-url", "not a url"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_method_list_is_fatal() {
        let command = new();
        let result = command.try_get_matches_from(vec![
            "gardisto-gateway",
            "--allowed-methods",
            "GET,TELEPORT",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_max_sessions_is_fatal() {
        let command = new();
        let result =
            command.try_get_matches_from(vec!["gardisto-gateway", "--max-sessions", "0"]);
        assert!(result.is_err());
    }
}
