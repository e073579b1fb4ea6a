use std::{env, path::PathBuf, sync::Arc};

use embed::{
    ApiClient, AssetPolicy, ChallengeSession, EngineConfig, HttpScriptHost, NoReactivity, Page,
    Translations, init_logging,
};
use serde_json::json;
use tracing::{info, warn};

const CSRF_TOKEN_ENV: &str = "CAREER_EMBED_CSRF_TOKEN";
const SESSION_COOKIE_ENV: &str = "CAREER_EMBED_SESSION_COOKIE";
const DEFAULT_STEP_ID: u64 = 1;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match parse_cli_args() {
        Ok(CliAction::Run(cli)) => *cli,
        Ok(CliAction::Help) => {
            print_cli_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("{}", binary_version_text());
            return Ok(());
        }
        Err(err) => {
            eprintln!("error: {err}\n");
            print_cli_help();
            return Err(err.into());
        }
    };

    init_logging()?;
    info!("{}", binary_version_text());

    let Some(base_url) = cli.base_url.clone() else {
        let err = "--base-url is required".to_string();
        eprintln!("error: {err}\n");
        print_cli_help();
        return Err(err.into());
    };
    let Some(challenge_id) = cli.challenge else {
        let err = "--challenge is required".to_string();
        eprintln!("error: {err}\n");
        print_cli_help();
        return Err(err.into());
    };

    let config = build_config(&cli, base_url)?;
    let page = Page::new()
        .with_region(DEFAULT_STEP_ID, challenge_id)
        .with_progress_bar()
        .with_progress_count()
        .with_step_card(DEFAULT_STEP_ID, true)
        .into_shared();
    let host = Arc::new(HttpScriptHost::new(ApiClient::new(&config)));
    let session = ChallengeSession::new(config, page.clone(), host.clone(), NoReactivity);

    let name = cli
        .name
        .clone()
        .unwrap_or_else(|| format!("challenge {challenge_id}"));
    let state = session.activate(challenge_id, &name).await;
    info!("activation finished: {state:?}");

    let submission = match cli.flag.as_deref() {
        Some(flag) => {
            let bound = page
                .lock()
                .expect("page lock poisoned")
                .set_flag_input(challenge_id, flag);
            if !bound {
                warn!("no region bound to challenge {challenge_id}; flag not entered");
            }
            Some(session.submit_flag(challenge_id).await)
        }
        None => None,
    };

    let report = {
        let page = page.lock().expect("page lock poisoned");
        json!({
            "state": state,
            "submission": submission,
            "page": &*page,
            "executed_scripts": host.executed(),
        })
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_config(cli: &CliArgs, base_url: String) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut policy = AssetPolicy::allow_list(cli.allowed_asset_prefixes.iter().cloned());
    if cli.no_inline_scripts {
        policy = policy.without_inline_scripts();
    }

    let mut config = EngineConfig::new(base_url)
        .with_career(cli.career_id.unwrap_or(0))
        .with_asset_policy(policy);
    config.session_cookie = cli
        .session_cookie
        .clone()
        .or_else(|| non_empty_env(SESSION_COOKIE_ENV));
    config.csrf_token = cli.csrf_token.clone().or_else(|| non_empty_env(CSRF_TOKEN_ENV));
    config.request_timeout_ms = cli.timeout_ms;

    if let Some(path) = cli.conventions.as_deref() {
        config.load_convention_overrides(path)?;
    }
    if let Some(path) = cli.translations.as_deref() {
        config.translations = Translations::load(path)?;
    }
    Ok(config)
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Clone, Debug, Default)]
struct CliArgs {
    base_url: Option<String>,
    session_cookie: Option<String>,
    csrf_token: Option<String>,
    career_id: Option<u64>,
    challenge: Option<u64>,
    name: Option<String>,
    flag: Option<String>,
    allowed_asset_prefixes: Vec<String>,
    no_inline_scripts: bool,
    conventions: Option<PathBuf>,
    translations: Option<PathBuf>,
    timeout_ms: Option<u64>,
}

enum CliAction {
    Run(Box<CliArgs>),
    Help,
    Version,
}

fn parse_cli_args() -> Result<CliAction, String> {
    parse_args(env::args().skip(1))
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliAction, String> {
    let mut args = args.peekable();
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "--base-url" => {
                cli.base_url = Some(next_arg_value("--base-url", &mut args)?);
            }
            "--session-cookie" => {
                cli.session_cookie = Some(next_arg_value("--session-cookie", &mut args)?);
            }
            "--csrf-token" => {
                cli.csrf_token = Some(next_arg_value("--csrf-token", &mut args)?);
            }
            "--career-id" => {
                cli.career_id = Some(parse_u64("--career-id", &mut args)?);
            }
            "--challenge" => {
                let value = parse_u64("--challenge", &mut args)?;
                if value == 0 {
                    return Err("--challenge must be a positive id".to_string());
                }
                cli.challenge = Some(value);
            }
            "--name" => {
                cli.name = Some(next_arg_value("--name", &mut args)?);
            }
            "--flag" => {
                cli.flag = Some(next_arg_value("--flag", &mut args)?);
            }
            "--allow-asset-prefix" => {
                cli.allowed_asset_prefixes
                    .push(next_arg_value("--allow-asset-prefix", &mut args)?);
            }
            "--no-inline-scripts" => cli.no_inline_scripts = true,
            "--conventions" => {
                cli.conventions = Some(PathBuf::from(next_arg_value("--conventions", &mut args)?));
            }
            "--translations" => {
                cli.translations =
                    Some(PathBuf::from(next_arg_value("--translations", &mut args)?));
            }
            "--timeout-ms" => {
                cli.timeout_ms = Some(parse_u64("--timeout-ms", &mut args)?);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }
    Ok(CliAction::Run(Box::new(cli)))
}

fn parse_u64(
    flag: &str,
    args: &mut std::iter::Peekable<impl Iterator<Item = String>>,
) -> Result<u64, String> {
    let value = next_arg_value(flag, args)?;
    value
        .parse::<u64>()
        .map_err(|_| format!("invalid {flag}: {value}"))
}

fn next_arg_value(
    flag: &str,
    args: &mut std::iter::Peekable<impl Iterator<Item = String>>,
) -> Result<String, String> {
    let value = args
        .next()
        .ok_or_else(|| format!("missing value for {flag}"))?;
    if value.trim().is_empty() {
        return Err(format!("value for {flag} cannot be empty"));
    }
    Ok(value)
}

fn print_cli_help() {
    eprintln!(concat!(
        "Usage: career-embed --base-url <URL> --challenge <ID> [options]\n\n",
        "Options:\n",
        "  --base-url <URL>               CTF server root, e.g. https://ctf.example\n",
        "  --challenge <ID>               Challenge to activate\n",
        "  --name <NAME>                  Display name for the loading placeholder\n",
        "  --career-id <ID>               Career whose progress is refreshed after a solve\n",
        "  --flag <FLAG>                  Submit this flag once the challenge is ready\n",
        "  --session-cookie <COOKIE>      Cookie header value (env: CAREER_EMBED_SESSION_COOKIE)\n",
        "  --csrf-token <TOKEN>           CSRF token for submissions (env: CAREER_EMBED_CSRF_TOKEN)\n",
        "  --allow-asset-prefix <PREFIX>  Trusted asset prefix; repeatable (default: allow all)\n",
        "  --no-inline-scripts            Do not run inline scripts found in views\n",
        "  --conventions <PATH>           JSON file of per-type view/script overrides\n",
        "  --translations <PATH>          JSON file of message translations\n",
        "  --timeout-ms <MS>              Per-request timeout\n",
        "  -V, --version                  Show version with git metadata\n",
        "  -h, --help                     Show this help\n"
    ));
}

fn binary_version_text() -> String {
    let binary = env!("CARGO_PKG_NAME");
    let git_tag = option_env!("CAREER_BUILD_GIT_TAG").unwrap_or("untagged");
    let git_commit = option_env!("CAREER_BUILD_GIT_COMMIT").unwrap_or("unknown");
    let git_dirty = option_env!("CAREER_BUILD_GIT_DIRTY").unwrap_or("false");
    let dirty = matches!(git_dirty, "true" | "1" | "yes" | "dirty");

    if dirty {
        format!("{binary} {git_tag} (dirty commit: {git_commit})")
    } else {
        format!("{binary} {git_tag}")
    }
}
